//! Hand-off to a foreign event loop.
//!
//! Once an [`ExternalLoop`] is installed, the loop stops expecting to be
//! driven by [`EventLoop::run`](crate::EventLoop::run). Every change in the
//! aggregate descriptor interest is forwarded to the adapter's `watch_*`
//! methods and every change of the earliest timer to
//! [`ExternalLoop::deadline_is`]. The foreign loop then reports readiness
//! back through [`LoopHandle::on_readable`](crate::LoopHandle::on_readable)
//! and friends.

use super::poller::common::Interest;
use crate::time::MonoTime;

use std::os::fd::RawFd;
use std::time::Duration;

/// Integration point for an externally driven event loop.
///
/// The adapter is called synchronously from whatever registration caused
/// the change, so its methods must only record the request with the
/// foreign loop. Calling back into the loop from inside them is not
/// supported.
pub trait ExternalLoop {
    /// Start or stop watching `fd` for readability.
    fn watch_readable(&mut self, fd: RawFd, interested: bool);

    /// Start or stop watching `fd` for writability.
    fn watch_writable(&mut self, fd: RawFd, interested: bool);

    /// Start or stop watching `fd` for exceptional conditions.
    fn watch_exception(&mut self, fd: RawFd, interested: bool);

    /// The earliest pending timer expires `after` from now.
    ///
    /// Each call replaces the previous one: there is only ever one
    /// outstanding deadline. `None` means no timer is pending and any
    /// registered deadline should be dropped. When it expires, call
    /// [`LoopHandle::on_timeout`](crate::LoopHandle::on_timeout).
    fn deadline_is(&mut self, after: Option<Duration>);
}

/// Routes a single-flag interest change to the matching adapter method.
pub(crate) fn forward_interest(adapter: &mut dyn ExternalLoop, fd: RawFd, flag: Interest, interested: bool) {
    match flag {
        Interest::READABLE => adapter.watch_readable(fd, interested),
        Interest::WRITABLE => adapter.watch_writable(fd, interested),
        Interest::EXCEPTIONAL => adapter.watch_exception(fd, interested),
        other => {
            for single in other.iter() {
                forward_interest(adapter, fd, single, interested);
            }
        }
    }
}

/// Converts an absolute deadline into the relative form adapters expect.
pub(crate) fn relative_deadline(next: Option<MonoTime>, now: MonoTime) -> Option<Duration> {
    next.filter(|d| !d.is_never())
        .map(|d| d.saturating_duration_since(now))
}
