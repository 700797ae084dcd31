//! Readiness-polling primitive.
//!
//! The scheduler core never talks to the OS directly: it hands the
//! aggregate [`PollRequest`] and a wait timeout to a [`Poller`] and gets
//! back the descriptors that are ready.
//!
//! The default backend is [`SelectPoller`]. Embedders and tests can supply
//! their own implementation through the builder.

pub(crate) mod common;
pub(crate) mod select;

pub(crate) mod unix;

use crate::reactor::event::{PollRequest, Readiness};

use std::io;
use std::time::Duration;

/// A blocking readiness wait over a set of descriptors.
pub trait Poller {
    /// Blocks until a requested condition holds on some descriptor, or until
    /// `timeout` elapses. `None` waits indefinitely; `Some(Duration::ZERO)`
    /// returns immediately.
    ///
    /// Only conditions named in `request` may be reported. Errors carry the
    /// OS error so the loop can tell an interrupt from a fatal failure.
    fn poll(&mut self, request: &PollRequest, timeout: Option<Duration>) -> io::Result<Readiness>;
}

impl<P: Poller + ?Sized> Poller for Box<P> {
    fn poll(&mut self, request: &PollRequest, timeout: Option<Duration>) -> io::Result<Readiness> {
        (**self).poll(request, timeout)
    }
}
