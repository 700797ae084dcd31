//! Callback interfaces implemented by loop participants.
//!
//! A participant is any value registered with the loop through a
//! [`LoopHandle`](crate::LoopHandle). The loop holds participants weakly and
//! calls back into them from its single thread; callbacks run to completion
//! and must not block, or every other participant stalls with them.

use std::os::fd::RawFd;

/// Receives readiness notifications for the descriptors it watches.
///
/// Each method is called at most once per ready flag per loop iteration,
/// and only for flags the participant currently watches on that descriptor.
pub trait FdHandler {
    /// The descriptor is readable.
    fn on_readable(&mut self, _fd: RawFd) {}

    /// The descriptor is writable.
    fn on_writable(&mut self, _fd: RawFd) {}

    /// The descriptor has an exceptional condition pending.
    fn on_exception(&mut self, _fd: RawFd) {}

    /// Whether this participant still has output queued for delivery.
    ///
    /// [`EventLoop::flush`](crate::EventLoop::flush) keeps iterating while any
    /// registered participant returns `true`.
    fn has_pending_output(&self) -> bool {
        false
    }
}

/// Receives the expiry of a single pending deadline.
pub trait TimeoutHandler {
    /// The configured deadline has been reached.
    ///
    /// The timer is already unset when this runs; arming it again from here
    /// schedules a fresh expiry on a later iteration.
    fn on_timeout(&mut self);
}

/// Receives the one-time initialization dispatch.
pub trait InitHandler {
    /// Runs once, before the loop first waits for readiness.
    fn on_initialized(&mut self);
}
