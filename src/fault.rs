//! Fault taxonomy and the fatal reporting path.
//!
//! The scheduler has no recoverable error type. A transient interrupt is
//! retried where it happens; every other fault is a programming error or
//! resource exhaustion and ends in [`fatal`]: the fault is logged, handed to
//! the embedder's hook (if one was configured), and then raised as a panic.

use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;

use thiserror::Error;

/// Callback invoked with the fault just before the loop panics.
///
/// Configured through [`EventLoopBuilder::fault_hook`](crate::EventLoopBuilder::fault_hook).
pub type FaultHook = Rc<dyn Fn(&Fault)>;

/// A condition the scheduler observed while driving the loop.
#[derive(Debug, Error)]
pub enum Fault {
    /// The blocking wait was interrupted by a signal.
    ///
    /// Never fatal: no readiness callback is invoked for the iteration, but
    /// due timers still fire.
    #[error("readiness wait interrupted")]
    Interrupted,

    /// A tracked descriptor is not open.
    #[error("bad file descriptor {0} in readiness request")]
    BadDescriptor(RawFd),

    /// A descriptor is negative or beyond what the polling primitive supports.
    #[error("file descriptor {0} is out of range for the readiness poller")]
    DescriptorOutOfRange(RawFd),

    /// The polling primitive rejected its arguments.
    #[error("invalid argument to readiness poller: {0}")]
    InvalidArgument(String),

    /// The system ran out of memory.
    #[error("system out of memory")]
    OutOfMemory,

    /// Any other failure of the polling primitive.
    #[error("readiness poll failed: {0}")]
    Poll(#[source] io::Error),

    /// The monotonic clock could not be read.
    #[error("monotonic clock unavailable: {0}")]
    Clock(#[source] io::Error),

    /// A registered participant was destroyed without withdrawing its interest.
    #[error("callback target destroyed while still registered")]
    ParticipantGone,

    /// A participant token outlived the loop it was registered with.
    #[error("event loop dropped while participants still reference it")]
    LoopGone,

    /// `run`, `flush` or `wait_for_initialized` was entered from a callback.
    #[error("event loop re-entered from one of its own callbacks")]
    Reentrant,
}

impl Fault {
    /// Classifies a failure reported by the readiness poller.
    pub fn from_poll_error(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EINTR) => Fault::Interrupted,
            Some(libc::EBADF) => Fault::BadDescriptor(-1),
            Some(libc::EINVAL) => Fault::InvalidArgument(err.to_string()),
            Some(libc::ENOMEM) => Fault::OutOfMemory,
            _ if err.kind() == io::ErrorKind::Interrupted => Fault::Interrupted,
            _ if err.kind() == io::ErrorKind::OutOfMemory => Fault::OutOfMemory,
            _ if err.kind() == io::ErrorKind::InvalidInput => {
                Fault::InvalidArgument(err.to_string())
            }
            _ => Fault::Poll(err),
        }
    }

    /// Returns `true` if the fault only asks for the iteration to be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Fault::Interrupted)
    }
}

/// Reports `fault` and panics.
///
/// The hook runs before the panic so the embedder can flush its own state
/// or record a diagnostic. A hook that panics itself replaces this panic.
pub fn fatal(fault: Fault, hook: Option<&FaultHook>) -> ! {
    tracing::error!(fault = %fault, "event loop fault");

    if let Some(hook) = hook {
        hook(&fault);
    }

    panic!("sysdb-loop: {fault}");
}
