//! Utilities for index-stable storage.
//!
//! This module provides low-level utilities used internally by the loop.
//! In particular, it exposes a [`Slab`] used to hand out participant and
//! timer identities.

mod slab;

pub(crate) use slab::Slab;
