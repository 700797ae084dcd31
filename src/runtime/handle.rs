//! Participant-facing registration API.
//!
//! A [`LoopHandle`] hands out one token per registration. The token is the
//! participant's only way to change what the loop does for it, and dropping
//! it withdraws everything: descriptor interest for an [`FdWatcher`], the
//! pending deadline for a [`Timer`], the initialization subscription for an
//! [`InitWatcher`]. Tokens and handles refer to the loop weakly; using one
//! after the loop is gone is a fatal [`Fault::LoopGone`].

use crate::fault::{Fault, fatal};
use crate::handler::{FdHandler, InitHandler, TimeoutHandler};
use crate::reactor::core::Core;
use crate::reactor::poller::common::Interest;
use crate::time::MonoTime;

use std::cell::RefCell;
use std::fmt;
use std::os::fd::RawFd;
use std::rc::{Rc, Weak};

fn upgrade(core: &Weak<Core>) -> Rc<Core> {
    match core.upgrade() {
        Some(core) => core,
        None => fatal(Fault::LoopGone, None),
    }
}

/// A cloneable reference to an [`EventLoop`](crate::EventLoop).
///
/// Used by participants to register themselves, read the loop's clock and
/// stop the loop, and by external loop adapters to deliver readiness.
#[derive(Clone)]
pub struct LoopHandle {
    core: Weak<Core>,
}

impl LoopHandle {
    pub(crate) fn new(core: Weak<Core>) -> Self {
        Self { core }
    }

    /// Registers `target` for descriptor readiness callbacks.
    ///
    /// The loop keeps only the weak reference. The returned watcher starts
    /// with no interest.
    pub fn fd_watcher<H: FdHandler + 'static>(&self, target: Weak<RefCell<H>>) -> FdWatcher {
        let target: Weak<RefCell<dyn FdHandler>> = target;
        let id = upgrade(&self.core).register_fd(target);

        FdWatcher {
            core: self.core.clone(),
            id,
        }
    }

    /// Registers `target` for timeout callbacks.
    ///
    /// The returned timer starts unarmed.
    pub fn timer<H: TimeoutHandler + 'static>(&self, target: Weak<RefCell<H>>) -> Timer {
        let target: Weak<RefCell<dyn TimeoutHandler>> = target;
        let id = upgrade(&self.core).register_timer(target);

        Timer {
            core: self.core.clone(),
            id,
        }
    }

    /// Subscribes `target` to the one-time initialization dispatch.
    ///
    /// Subscribing after initialization already ran has no effect.
    pub fn init_watcher<H: InitHandler + 'static>(&self, target: Weak<RefCell<H>>) -> InitWatcher {
        let target: Weak<RefCell<dyn InitHandler>> = target;
        let id = upgrade(&self.core).register_init(target);

        InitWatcher {
            core: self.core.clone(),
            id,
        }
    }

    /// Current time on the loop's clock.
    pub fn now(&self) -> MonoTime {
        upgrade(&self.core).now()
    }

    /// Asks a running loop to return after its current iteration.
    pub fn stop(&self) {
        upgrade(&self.core).stop();
    }

    /// Returns `true` once the initialization dispatch has run.
    pub fn is_initialized(&self) -> bool {
        upgrade(&self.core).is_initialized()
    }

    /// Notifies the loop that `fd` is readable.
    ///
    /// For external loop adapters. Every participant watching `fd` for
    /// readability is called back.
    pub fn on_readable(&self, fd: RawFd) {
        upgrade(&self.core).dispatch_fd(fd, Interest::READABLE);
    }

    /// Notifies the loop that `fd` is writable.
    pub fn on_writable(&self, fd: RawFd) {
        upgrade(&self.core).dispatch_fd(fd, Interest::WRITABLE);
    }

    /// Notifies the loop that `fd` has an exceptional condition.
    pub fn on_exception(&self, fd: RawFd) {
        upgrade(&self.core).dispatch_fd(fd, Interest::EXCEPTIONAL);
    }

    /// Notifies the loop that the deadline last passed to
    /// [`ExternalLoop::deadline_is`](crate::ExternalLoop::deadline_is) expired.
    ///
    /// Fires every timer that is due. A call that arrives early fires
    /// nothing and only re-registers the deadline.
    pub fn on_timeout(&self) {
        upgrade(&self.core).on_timeout();
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle")
            .field("alive", &(self.core.strong_count() > 0))
            .finish()
    }
}

/// Registration of an [`FdHandler`] with the loop.
pub struct FdWatcher {
    core: Weak<Core>,
    id: usize,
}

impl FdWatcher {
    /// Starts or stops watching `fd` for readability.
    pub fn watch_readable(&self, fd: RawFd, interested: bool) {
        self.interest_is(fd, interested, Interest::READABLE);
    }

    /// Starts or stops watching `fd` for writability.
    pub fn watch_writable(&self, fd: RawFd, interested: bool) {
        self.interest_is(fd, interested, Interest::WRITABLE);
    }

    /// Starts or stops watching `fd` for exceptional conditions.
    pub fn watch_exception(&self, fd: RawFd, interested: bool) {
        self.interest_is(fd, interested, Interest::EXCEPTIONAL);
    }

    /// Adds (`want`) or removes every flag in `interest` on `fd`.
    ///
    /// # Panics
    ///
    /// A negative `fd` is a fatal [`Fault::DescriptorOutOfRange`].
    pub fn interest_is(&self, fd: RawFd, want: bool, interest: Interest) {
        let core = upgrade(&self.core);
        for flag in interest.iter() {
            core.interest_is(self.id, fd, want, flag);
        }
    }

    /// Flags currently watched on `fd`.
    pub fn interest(&self, fd: RawFd) -> Interest {
        upgrade(&self.core).interest(self.id, fd)
    }

    /// Descriptors with at least one watched flag, ascending.
    pub fn fds(&self) -> Vec<RawFd> {
        upgrade(&self.core).watched_fds(self.id)
    }

    /// Stops watching every descriptor, keeping the registration.
    pub fn unwatch_all(&self) {
        for fd in self.fds() {
            self.interest_is(fd, false, self.interest(fd));
        }
    }
}

impl Drop for FdWatcher {
    fn drop(&mut self) {
        if let Some(core) = self.core.upgrade() {
            core.unregister_fd(self.id);
        }
    }
}

impl fmt::Debug for FdWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FdWatcher").field("id", &self.id).finish()
    }
}

/// Registration of a [`TimeoutHandler`] with the loop.
///
/// Holds at most one pending deadline. Setting a new one replaces it.
pub struct Timer {
    core: Weak<Core>,
    id: usize,
}

impl Timer {
    /// Arms, rearms or (with [`MonoTime::NEVER`]) cancels the timer.
    ///
    /// `on_timeout` runs as soon as possible after `deadline`, never before.
    pub fn timeout_time_is(&self, deadline: MonoTime) {
        upgrade(&self.core).timeout_is(self.id, deadline);
    }

    /// Cancels the pending deadline, if any.
    pub fn cancel(&self) {
        self.timeout_time_is(MonoTime::NEVER);
    }

    /// The pending deadline, [`MonoTime::NEVER`] when unarmed.
    pub fn timeout_time(&self) -> MonoTime {
        upgrade(&self.core).timeout_time(self.id)
    }

    /// Returns `true` while a deadline is pending.
    pub fn is_armed(&self) -> bool {
        !self.timeout_time().is_never()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(core) = self.core.upgrade() {
            core.unregister_timer(self.id);
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer").field("id", &self.id).finish()
    }
}

/// Subscription of an [`InitHandler`] to the initialization dispatch.
pub struct InitWatcher {
    core: Weak<Core>,
    id: usize,
}

impl Drop for InitWatcher {
    fn drop(&mut self) {
        if let Some(core) = self.core.upgrade() {
            core.unregister_init(self.id);
        }
    }
}

impl fmt::Debug for InitWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitWatcher").field("id", &self.id).finish()
    }
}
