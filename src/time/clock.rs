use super::MonoTime;

use libc::{CLOCK_MONOTONIC, clock_gettime, timespec};
use std::cell::Cell;
use std::io;
use std::mem;
use std::rc::Rc;
use std::time::Duration;

/// A source of monotonic time.
///
/// The loop reads its clock once per decision point (wait computation,
/// timer drain, end-of-run check). An implementation must never return a
/// value earlier than one it already returned.
pub trait Clock {
    /// Returns the current monotonic time.
    ///
    /// An error is treated as fatal by the loop.
    fn now(&self) -> io::Result<MonoTime>;
}

/// The operating system's monotonic clock (`CLOCK_MONOTONIC`).
///
/// Unaffected by wall-clock adjustments and leap seconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> io::Result<MonoTime> {
        let mut ts: timespec = unsafe { mem::zeroed() };

        let rc = unsafe { clock_gettime(CLOCK_MONOTONIC, &mut ts) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(MonoTime::from_duration(Duration::new(
            ts.tv_sec as u64,
            ts.tv_nsec as u32,
        )))
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same reading, so a test can keep one handle and give
/// another to the loop, then advance time past a deadline without sleeping.
///
/// # Examples
///
/// ```rust,ignore
/// let clock = ManualClock::new();
/// let event_loop = EventLoopBuilder::new().clock(clock.clone()).build();
///
/// clock.advance(Duration::from_millis(150));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    /// Creates a clock reading [`MonoTime::ZERO`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock reading `start`.
    pub fn starting_at(start: MonoTime) -> Self {
        Self {
            now: Rc::new(Cell::new(start.as_duration())),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by));
    }

    /// Moves the clock to `to`.
    ///
    /// # Panics
    ///
    /// Panics if `to` is earlier than the current reading.
    pub fn set(&self, to: MonoTime) {
        assert!(
            to.as_duration() >= self.now.get(),
            "monotonic clock cannot move backward"
        );

        self.now.set(to.as_duration());
    }

    /// Returns the current reading without going through [`Clock`].
    pub fn get(&self) -> MonoTime {
        MonoTime::from_duration(self.now.get())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> io::Result<MonoTime> {
        Ok(self.get())
    }
}
