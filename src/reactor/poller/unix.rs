use libc::{F_GETFD, FD_ISSET, FD_SET, FD_SETSIZE, FD_ZERO, c_int, fcntl, fd_set, select, timeval};
use std::collections::BTreeSet;
use std::os::fd::RawFd;
use std::time::Duration;
use std::{io, mem, ptr};

/// Highest descriptor value `select(2)` can watch, exclusive.
pub(crate) const SELECT_LIMIT: RawFd = FD_SETSIZE as RawFd;

/// Builds an `fd_set` holding `fds`.
///
/// Every descriptor must be in `0..SELECT_LIMIT`; callers check first.
pub(crate) fn fd_set_from(fds: &BTreeSet<RawFd>) -> fd_set {
    let mut set: fd_set = unsafe { mem::zeroed() };

    unsafe {
        FD_ZERO(&mut set);
        for &fd in fds {
            FD_SET(fd, &mut set);
        }
    }

    set
}

/// Returns the members of `candidates` that `select(2)` left set in `set`.
pub(crate) fn fd_set_members(set: &fd_set, candidates: &BTreeSet<RawFd>) -> BTreeSet<RawFd> {
    candidates
        .iter()
        .copied()
        .filter(|&fd| unsafe { FD_ISSET(fd, set) })
        .collect()
}

/// Converts a wait duration to a `timeval`, rounding up to the next
/// microsecond so the wait never ends before the requested time.
pub(crate) fn duration_to_timeval(duration: Duration) -> timeval {
    let mut secs = duration.as_secs();
    let mut micros = duration.subsec_nanos().div_ceil(1_000);

    if micros == 1_000_000 {
        secs += 1;
        micros = 0;
    }

    timeval {
        tv_sec: secs.min(libc::time_t::MAX as u64) as libc::time_t,
        tv_usec: micros as libc::suseconds_t,
    }
}

/// Calls `select(2)`.
///
/// `timeout` of `None` blocks until a descriptor is ready.
/// Returns the number of ready descriptors.
pub(crate) fn sys_select(
    nfds: c_int,
    read: &mut fd_set,
    write: &mut fd_set,
    except: &mut fd_set,
    timeout: Option<Duration>,
) -> io::Result<usize> {
    let mut tv = timeout.map(duration_to_timeval);
    let tv_ptr = tv
        .as_mut()
        .map_or(ptr::null_mut(), |tv| tv as *mut timeval);

    let rc = unsafe { select(nfds, read, write, except, tv_ptr) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(rc as usize)
}

/// Returns `true` if `fd` refers to an open descriptor.
pub(crate) fn sys_fd_is_open(fd: RawFd) -> bool {
    if fd < 0 {
        return false;
    }

    unsafe { fcntl(fd, F_GETFD) >= 0 }
}

#[cfg(test)]
pub(crate) fn sys_pipe() -> io::Result<(RawFd, RawFd)> {
    let mut fds = [0 as c_int; 2];

    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok((fds[0], fds[1]))
}

#[cfg(test)]
pub(crate) fn sys_close(fd: RawFd) {
    unsafe { libc::close(fd) };
}
