use super::EventLoop;
use crate::fault::{Fault, FaultHook};
use crate::reactor::core::Core;
use crate::reactor::poller::Poller;
use crate::reactor::poller::select::SelectPoller;
use crate::time::{Clock, SystemClock};

use std::rc::Rc;

/// Builder for configuring and creating an event loop.
///
/// `EventLoopBuilder` allows customizing the loop's collaborators before
/// constructing it: the readiness poller, the monotonic clock, and a hook
/// that observes fatal faults.
///
/// # Examples
///
/// ```rust,ignore
/// let event_loop = EventLoopBuilder::new()
///     .clock(ManualClock::new())
///     .fault_hook(|fault| eprintln!("agent dying: {fault}"))
///     .build();
/// ```
pub struct EventLoopBuilder {
    /// Readiness-polling primitive.
    poller: Box<dyn Poller>,

    /// Source of monotonic time.
    clock: Box<dyn Clock>,

    /// Called with the fault before the loop panics.
    fault_hook: Option<FaultHook>,
}

impl EventLoopBuilder {
    /// Creates a new `EventLoopBuilder` with default configuration.
    ///
    /// By default the loop polls with `select(2)` and reads
    /// `CLOCK_MONOTONIC`.
    pub fn new() -> Self {
        Self {
            poller: Box::new(SelectPoller::new()),
            clock: Box::new(SystemClock),
            fault_hook: None,
        }
    }

    /// Replaces the readiness poller.
    pub fn poller(mut self, poller: impl Poller + 'static) -> Self {
        self.poller = Box::new(poller);
        self
    }

    /// Replaces the monotonic clock.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Sets the hook invoked with a fatal fault just before the loop panics.
    pub fn fault_hook(mut self, hook: impl Fn(&Fault) + 'static) -> Self {
        self.fault_hook = Some(Rc::new(hook));
        self
    }

    /// Builds the event loop with the configured options.
    pub fn build(self) -> EventLoop {
        EventLoop::from_core(Core::new(self.poller, self.clock, self.fault_hook))
    }
}

impl Default for EventLoopBuilder {
    /// Creates a default `EventLoopBuilder`.
    fn default() -> Self {
        Self::new()
    }
}
