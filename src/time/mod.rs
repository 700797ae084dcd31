//! Monotonic time.
//!
//! Every deadline the loop handles is a [`MonoTime`]: a point on a clock
//! that only moves forward and ignores wall-clock adjustments.
//!
//! It includes:
//! - [`MonoTime`] and its [`MonoTime::NEVER`] sentinel,
//! - the [`Clock`] trait read by the loop,
//! - [`SystemClock`] backed by `CLOCK_MONOTONIC`,
//! - [`ManualClock`] for deterministic simulations and tests.

mod clock;

#[doc(inline)]
pub use clock::{Clock, ManualClock, SystemClock};

use std::fmt;
use std::ops::Add;
use std::time::Duration;

/// A point in time on the monotonic clock.
///
/// Stored as the elapsed time since an arbitrary origin (system boot for
/// [`SystemClock`], zero for a fresh [`ManualClock`]). The value is not
/// convertible to a wall-clock time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonoTime(Duration);

impl MonoTime {
    /// A future time that the clock can never reach.
    ///
    /// Arming a timer with `NEVER` cancels it. Because it orders after every
    /// reachable time, it also acts as "no deadline" in comparisons.
    pub const NEVER: MonoTime = MonoTime(Duration::MAX);

    /// The clock origin.
    pub const ZERO: MonoTime = MonoTime(Duration::ZERO);

    /// Creates a time from the elapsed duration since the clock origin.
    pub const fn from_duration(since_origin: Duration) -> Self {
        Self(since_origin)
    }

    /// Creates a time from fractional seconds since the clock origin.
    ///
    /// Negative and non-finite inputs saturate to the origin and to
    /// [`MonoTime::NEVER`] respectively.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() || secs <= 0.0 {
            return Self::ZERO;
        }

        Duration::try_from_secs_f64(secs)
            .map(Self)
            .unwrap_or(Self::NEVER)
    }

    /// Returns the elapsed duration since the clock origin.
    pub const fn as_duration(self) -> Duration {
        self.0
    }

    /// Returns fractional seconds since the clock origin.
    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Returns `true` for the [`MonoTime::NEVER`] sentinel.
    pub fn is_never(self) -> bool {
        self.0 == Duration::MAX
    }

    /// Returns the time elapsed from `earlier` to `self`, or zero if `earlier`
    /// is later than `self`.
    pub fn saturating_duration_since(self, earlier: MonoTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for MonoTime {
    type Output = MonoTime;

    /// Saturates at [`MonoTime::NEVER`].
    fn add(self, rhs: Duration) -> MonoTime {
        MonoTime(self.0.saturating_add(rhs))
    }
}

impl fmt::Debug for MonoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            f.write_str("MonoTime(never)")
        } else {
            write!(f, "MonoTime({:.6}s)", self.as_secs_f64())
        }
    }
}
