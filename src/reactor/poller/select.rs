//! `select(2)`-based poller.
//!
//! Descriptor sets are rebuilt from the aggregate request on every call,
//! so the poller itself keeps no registration state. Descriptors must lie
//! in `0..FD_SETSIZE`.

use super::Poller;
use super::unix::{SELECT_LIMIT, fd_set_from, fd_set_members, sys_select};
use crate::reactor::event::{PollRequest, Readiness};

use std::io;
use std::time::Duration;

/// The default readiness poller.
#[derive(Debug, Default)]
pub struct SelectPoller {
    _private: (),
}

impl SelectPoller {
    /// Creates a new `SelectPoller`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Poller for SelectPoller {
    fn poll(&mut self, request: &PollRequest, timeout: Option<Duration>) -> io::Result<Readiness> {
        if let Some(fd) = request.fds().find(|&fd| !(0..SELECT_LIMIT).contains(&fd)) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("descriptor {fd} outside select range 0..{SELECT_LIMIT}"),
            ));
        }

        let mut read = fd_set_from(&request.read);
        let mut write = fd_set_from(&request.write);
        let mut except = fd_set_from(&request.except);

        let nfds = request.max_fd.map_or(0, |fd| fd + 1);

        let n = sys_select(nfds, &mut read, &mut write, &mut except, timeout)?;

        let mut readiness = Readiness::default();
        if n == 0 {
            return Ok(readiness);
        }

        readiness.read = fd_set_members(&read, &request.read);
        readiness.write = fd_set_members(&write, &request.write);
        readiness.except = fd_set_members(&except, &request.except);

        Ok(readiness)
    }
}
