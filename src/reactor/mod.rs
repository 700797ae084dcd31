//! Scheduler core and its data structures.
//!
//! This module implements the reactor component of the loop.
//! The reactor is responsible for:
//! - tracking which descriptors participants want polled, and for what,
//! - keeping pending deadlines in deadline order,
//! - blocking on the readiness poller and dispatching callbacks,
//! - forwarding registrations to an external loop when one is installed.
//!
//! Most users interact with it through [`EventLoop`](crate::EventLoop) and
//! [`LoopHandle`](crate::LoopHandle) rather than directly.

pub(crate) mod core;
pub(crate) mod event;
pub(crate) mod external;
pub(crate) mod io;
pub(crate) mod poller;
pub(crate) mod timer;
