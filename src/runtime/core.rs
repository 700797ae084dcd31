use super::builder::EventLoopBuilder;
use super::handle::LoopHandle;
use crate::reactor::core::{Core, LoopState};
use crate::reactor::event::PollRequest;
use crate::reactor::external::ExternalLoop;
use crate::time::MonoTime;

use std::rc::Rc;
use std::time::Duration;

/// The event loop.
///
/// `EventLoop` owns the scheduler: the descriptor registry, the timer heap
/// and the readiness poller. It is responsible for:
/// - running the loop on demand ([`run`](Self::run), [`run_forever`](Self::run_forever)),
/// - the one-time initialization dispatch ([`wait_for_initialized`](Self::wait_for_initialized)),
/// - draining queued output before exit ([`flush`](Self::flush)),
/// - handing control to a foreign loop ([`external_loop_is`](Self::external_loop_is)).
///
/// Participants never see the `EventLoop` itself, only a [`LoopHandle`].
/// The loop is single-threaded: neither type is `Send`.
///
/// # Examples
///
/// ```rust,ignore
/// let event_loop = EventLoop::new();
/// let handle = event_loop.handle();
///
/// let agent = Rc::new(RefCell::new(Agent::default()));
/// let timer = handle.timer(Rc::downgrade(&agent));
/// timer.timeout_time_is(handle.now() + Duration::from_secs(1));
///
/// event_loop.run(Duration::from_secs(2));
/// ```
pub struct EventLoop {
    core: Rc<Core>,
}

impl EventLoop {
    /// Creates an event loop with the default poller and clock.
    pub fn new() -> Self {
        EventLoopBuilder::new().build()
    }

    /// Returns a builder for a customized event loop.
    pub fn builder() -> EventLoopBuilder {
        EventLoopBuilder::new()
    }

    pub(crate) fn from_core(core: Core) -> Self {
        Self {
            core: Rc::new(core),
        }
    }

    /// Returns a handle participants use to register with this loop.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle::new(Rc::downgrade(&self.core))
    }

    /// Runs the loop for `duration`.
    ///
    /// A zero duration performs a single non-blocking pass: whatever is
    /// ready or due right now is dispatched and control returns.
    ///
    /// # Panics
    ///
    /// Panics if called from one of this loop's callbacks, or on a fatal
    /// poller or clock failure.
    pub fn run(&self, duration: Duration) {
        self.core.run_loop(Some(duration), |_| false);
    }

    /// Runs the loop until [`stop`](Self::stop) is called from a callback.
    ///
    /// With nothing registered and no pending timer this blocks forever.
    pub fn run_forever(&self) {
        self.core.run_loop(None, |_| false);
    }

    /// Asks a running loop to return after its current iteration.
    ///
    /// Has no effect when the loop is not running.
    pub fn stop(&self) {
        self.core.stop();
    }

    /// Runs the one-time initialization dispatch if it has not happened yet.
    ///
    /// Usually called right after creating the loop, as an alternative to
    /// waiting for [`InitHandler::on_initialized`](crate::InitHandler::on_initialized).
    pub fn wait_for_initialized(&self) {
        if !self.core.is_initialized() {
            self.run(Duration::ZERO);
        }
    }

    /// Runs iterations until no participant reports pending output.
    ///
    /// Call before the process exits so everything queued by participants
    /// gets delivered. Returns at once if nothing is pending.
    pub fn flush(&self) {
        self.core.run_loop(None, |core| !core.has_pending_output());
    }

    /// Hands scheduling to an external event loop.
    ///
    /// Initialization runs first if it has not yet. The adapter then
    /// receives every currently tracked descriptor and the current deadline,
    /// and from then on every change to either.
    pub fn external_loop_is(&self, adapter: impl ExternalLoop + 'static) {
        self.wait_for_initialized();
        self.core.install_external(Box::new(adapter));
    }

    /// Removes the external loop adapter, returning it.
    ///
    /// Registrations are kept, so [`run`](Self::run) can take over again.
    pub fn clear_external_loop(&self) -> Option<Box<dyn ExternalLoop>> {
        self.core.take_external()
    }

    /// Returns `true` while an external loop adapter is installed.
    pub fn has_external_loop(&self) -> bool {
        self.core.has_external()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.core.state()
    }

    /// Returns `true` once the initialization dispatch has run.
    pub fn is_initialized(&self) -> bool {
        self.core.is_initialized()
    }

    /// Number of completed loop iterations.
    pub fn iterations(&self) -> u64 {
        self.core.iterations()
    }

    /// Current time on the loop's clock.
    pub fn now(&self) -> MonoTime {
        self.core.now()
    }

    /// The readiness request the next iteration would poll with.
    pub fn poll_request(&self) -> PollRequest {
        self.core.build_request()
    }

    /// Number of armed timers.
    pub fn pending_timers(&self) -> usize {
        self.core.pending_timers()
    }

    /// Earliest armed deadline, if any.
    pub fn next_deadline(&self) -> Option<MonoTime> {
        self.core.next_deadline()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}
