//! Loop ownership and participant registration.
//!
//! This module contains the public face of the scheduler:
//! - [`EventLoop`], the owning context object the application creates once,
//! - [`EventLoopBuilder`], its configuration surface,
//! - [`LoopHandle`] and the registration tokens participants hold.

mod core;

pub(crate) mod builder;
pub(crate) mod handle;

pub use self::core::EventLoop;
