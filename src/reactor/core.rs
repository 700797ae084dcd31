use super::event::{PollRequest, Readiness};
use super::external::{ExternalLoop, forward_interest, relative_deadline};
use super::io::{Registry, Snapshot};
use super::poller::Poller;
use super::poller::common::Interest;
use super::poller::unix::sys_fd_is_open;
use super::timer::TimerHeap;
use crate::fault::{Fault, FaultHook, fatal};
use crate::handler::{FdHandler, InitHandler, TimeoutHandler};
use crate::time::{Clock, MonoTime};
use crate::utils::Slab;

use std::cell::{Cell, RefCell};
use std::os::fd::RawFd;
use std::rc::Weak;
use std::time::Duration;

pub(crate) type FdOwner = Weak<RefCell<dyn FdHandler>>;
pub(crate) type TimerOwner = Weak<RefCell<dyn TimeoutHandler>>;
pub(crate) type InitOwner = Weak<RefCell<dyn InitHandler>>;

/// Lifecycle of the internal loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// The loop has never been entered.
    Idle,
    /// A `run`, `run_forever` or `flush` call is in progress.
    Running,
    /// The last call returned. A new call enters `Running` again.
    Stopped,
}

/// Scheduler state shared between the loop owner and its participants.
///
/// Every field is behind `Cell`/`RefCell` and no borrow is held while a
/// participant callback runs, so callbacks may freely register, withdraw
/// interest or rearm timers.
pub(crate) struct Core {
    registry: RefCell<Registry<FdOwner>>,
    timers: RefCell<TimerHeap<TimerOwner>>,
    init: RefCell<Slab<InitOwner>>,

    poller: RefCell<Box<dyn Poller>>,
    clock: Box<dyn Clock>,
    external: RefCell<Option<Box<dyn ExternalLoop>>>,
    fault_hook: Option<FaultHook>,

    state: Cell<LoopState>,
    running: Cell<bool>,
    in_loop: Cell<bool>,
    initialized: Cell<bool>,
    iterations: Cell<u64>,
}

/// Restores the loop flags however `run_loop` exits.
struct LoopGuard<'a>(&'a Core);

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.0.in_loop.set(false);
        self.0.running.set(false);
        self.0.state.set(LoopState::Stopped);
    }
}

impl Core {
    pub(crate) fn new(
        poller: Box<dyn Poller>,
        clock: Box<dyn Clock>,
        fault_hook: Option<FaultHook>,
    ) -> Self {
        Self {
            registry: RefCell::new(Registry::new()),
            timers: RefCell::new(TimerHeap::new()),
            init: RefCell::new(Slab::new(4)),
            poller: RefCell::new(poller),
            clock,
            external: RefCell::new(None),
            fault_hook,
            state: Cell::new(LoopState::Idle),
            running: Cell::new(false),
            in_loop: Cell::new(false),
            initialized: Cell::new(false),
            iterations: Cell::new(0),
        }
    }

    pub(crate) fn fatal(&self, fault: Fault) -> ! {
        fatal(fault, self.fault_hook.as_ref())
    }

    pub(crate) fn now(&self) -> MonoTime {
        match self.clock.now() {
            Ok(now) => now,
            Err(err) => self.fatal(Fault::Clock(err)),
        }
    }

    pub(crate) fn state(&self) -> LoopState {
        self.state.get()
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub(crate) fn iterations(&self) -> u64 {
        self.iterations.get()
    }

    pub(crate) fn stop(&self) {
        self.running.set(false);
    }

    // ── Participants ───────────────────────────────────────────────

    pub(crate) fn register_fd(&self, owner: FdOwner) -> usize {
        let mut registry = self.registry.borrow_mut();
        let id = registry.insert(owner);
        tracing::debug!(participant = id, participants = registry.len(), "fd participant registered");
        id
    }

    pub(crate) fn unregister_fd(&self, id: usize) {
        let withdrawn = self.registry.borrow_mut().remove(id);
        tracing::debug!(participant = id, withdrawn = withdrawn.len(), "fd participant removed");

        if let Some(adapter) = self.external.borrow_mut().as_mut() {
            for (fd, flag) in withdrawn {
                forward_interest(adapter.as_mut(), fd, flag, false);
            }
        }
    }

    pub(crate) fn interest_is(&self, id: usize, fd: RawFd, want: bool, flag: Interest) {
        if fd < 0 {
            self.fatal(Fault::DescriptorOutOfRange(fd));
        }

        let flipped = self.registry.borrow_mut().interest_is(id, fd, want, flag);
        tracing::trace!(participant = id, fd, want, ?flag, "interest changed");

        if let Some(interested) = flipped {
            if let Some(adapter) = self.external.borrow_mut().as_mut() {
                forward_interest(adapter.as_mut(), fd, flag, interested);
            }
        }
    }

    pub(crate) fn interest(&self, id: usize, fd: RawFd) -> Interest {
        self.registry
            .borrow()
            .get(id)
            .map_or(Interest::NONE, |p| p.interest.get(fd))
    }

    pub(crate) fn watched_fds(&self, id: usize) -> Vec<RawFd> {
        self.registry
            .borrow()
            .get(id)
            .map(|p| p.interest.iter().map(|(fd, _)| fd).collect())
            .unwrap_or_default()
    }

    pub(crate) fn register_timer(&self, owner: TimerOwner) -> usize {
        let id = self.timers.borrow_mut().insert_owner(owner);
        tracing::debug!(timer = id, "timer registered");
        id
    }

    pub(crate) fn unregister_timer(&self, id: usize) {
        let was_pending = !self.timers.borrow().deadline(id).is_never();
        self.timers.borrow_mut().remove_owner(id);
        tracing::debug!(timer = id, "timer removed");

        if was_pending {
            self.push_deadline();
        }
    }

    pub(crate) fn timeout_is(&self, id: usize, deadline: MonoTime) {
        let known = self.timers.borrow_mut().timeout_is(id, deadline);
        debug_assert!(known, "timer identity outlived its registration");
        tracing::trace!(timer = id, ?deadline, "timeout set");

        self.push_deadline();
    }

    pub(crate) fn timeout_time(&self, id: usize) -> MonoTime {
        self.timers.borrow().deadline(id)
    }

    pub(crate) fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub(crate) fn next_deadline(&self) -> Option<MonoTime> {
        self.timers.borrow().peek_min().map(|(_, deadline)| deadline)
    }

    pub(crate) fn register_init(&self, owner: InitOwner) -> usize {
        self.init.borrow_mut().insert(owner)
    }

    pub(crate) fn unregister_init(&self, id: usize) {
        self.init.borrow_mut().remove(id);
    }

    pub(crate) fn build_request(&self) -> PollRequest {
        self.registry.borrow().build_request()
    }

    // ── External loop ──────────────────────────────────────────────

    /// Installs `adapter` and replays the current interest and deadline.
    pub(crate) fn install_external(&self, adapter: Box<dyn ExternalLoop>) {
        let request = self.build_request();
        tracing::debug!(fds = request.fds().count(), "external loop installed");

        *self.external.borrow_mut() = Some(adapter);

        if let Some(adapter) = self.external.borrow_mut().as_mut() {
            for (fd, interest) in request.fds().map(|fd| (fd, request.interest(fd))) {
                forward_interest(adapter.as_mut(), fd, interest, true);
            }
        }

        self.push_deadline();
    }

    pub(crate) fn take_external(&self) -> Option<Box<dyn ExternalLoop>> {
        self.external.borrow_mut().take()
    }

    pub(crate) fn has_external(&self) -> bool {
        self.external.borrow().is_some()
    }

    /// Tells the adapter, if any, when the earliest timer expires.
    fn push_deadline(&self) {
        if !self.has_external() {
            return;
        }

        let after = relative_deadline(self.next_deadline(), self.now());

        if let Some(adapter) = self.external.borrow_mut().as_mut() {
            adapter.deadline_is(after);
        }
    }

    /// Delivers `flag` on `fd` to every participant watching it.
    pub(crate) fn dispatch_fd(&self, fd: RawFd, flag: Interest) {
        let watchers = self.registry.borrow().watchers(fd, flag);

        for (id, owner) in watchers {
            self.invoke_fd(id, &owner, fd, flag);
        }
    }

    /// Fires every due timer, then re-registers the next deadline.
    pub(crate) fn on_timeout(&self) {
        self.drain_timers();
        self.push_deadline();
    }

    // ── Loop ───────────────────────────────────────────────────────

    /// Runs the one-time initialization dispatch if it has not happened yet.
    pub(crate) fn initialize(&self) {
        if self.initialized.replace(true) {
            return;
        }

        let owners: Vec<InitOwner> = self.init.borrow().iter().map(|(_, w)| w.clone()).collect();
        tracing::debug!(handlers = owners.len(), "initialization dispatch");

        for owner in owners {
            if let Some(handler) = owner.upgrade() {
                handler.borrow_mut().on_initialized();
            }
        }
    }

    /// Drives iterations until `duration` elapses (`None`: until stopped)
    /// or until `done` holds at the top of an iteration.
    pub(crate) fn run_loop(&self, duration: Option<Duration>, mut done: impl FnMut(&Core) -> bool) {
        if self.in_loop.replace(true) {
            self.fatal(Fault::Reentrant);
        }
        let _guard = LoopGuard(self);

        self.initialize();

        let loop_end = duration.map(|d| self.now() + d);
        tracing::debug!(?loop_end, "loop started");

        self.running.set(true);
        self.state.set(LoopState::Running);

        while self.running.get() {
            if done(self) {
                break;
            }

            self.iterate(loop_end);

            if loop_end.is_some_and(|end| end <= self.now()) {
                break;
            }
        }

        tracing::debug!(iterations = self.iterations.get(), "loop stopped");
    }

    /// One pass: poll for readiness, dispatch fds, drain due timers.
    fn iterate(&self, loop_end: Option<MonoTime>) {
        let (request, snapshot) = {
            let registry = self.registry.borrow();
            (registry.build_request(), registry.snapshot())
        };

        let next_deadline = match (self.next_deadline(), loop_end) {
            (Some(timer), Some(end)) => Some(timer.min(end)),
            (timer, end) => timer.or(end),
        };
        let timeout = next_deadline.map(|d| d.saturating_duration_since(self.now()));

        tracing::trace!(
            fds = snapshot.len(),
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "waiting for readiness"
        );

        let result = self.poller.borrow_mut().poll(&request, timeout);

        match result {
            Ok(readiness) => self.dispatch_ready(&snapshot, &readiness),
            Err(err) => match Fault::from_poll_error(err) {
                Fault::Interrupted => tracing::trace!("readiness wait interrupted"),
                Fault::BadDescriptor(_) => {
                    let fd = request
                        .fds()
                        .find(|&fd| !sys_fd_is_open(fd))
                        .unwrap_or(-1);
                    self.fatal(Fault::BadDescriptor(fd));
                }
                fault => self.fatal(fault),
            },
        }

        self.on_timeout();
        self.iterations.set(self.iterations.get() + 1);
    }

    fn dispatch_ready(&self, snapshot: &[Snapshot<FdOwner>], readiness: &Readiness) {
        if readiness.is_empty() {
            return;
        }

        for entry in snapshot {
            for (fd, interest) in entry.interest.iter() {
                let ready = readiness.ready(fd);

                for flag in interest.iter().filter(|&flag| ready.contains(flag)) {
                    self.invoke_fd(entry.id, &entry.owner, fd, flag);
                }
            }
        }
    }

    fn invoke_fd(&self, id: usize, owner: &FdOwner, fd: RawFd, flag: Interest) {
        // Skip participants removed by an earlier callback.
        let registered = self
            .registry
            .borrow()
            .get(id)
            .is_some_and(|p| Weak::ptr_eq(&p.owner, owner));
        if !registered {
            return;
        }

        let Some(target) = owner.upgrade() else {
            self.fatal(Fault::ParticipantGone);
        };

        let mut handler = target.borrow_mut();
        match flag {
            Interest::READABLE => handler.on_readable(fd),
            Interest::WRITABLE => handler.on_writable(fd),
            _ => handler.on_exception(fd),
        }
    }

    /// Fires due timers in ascending deadline order, each exactly once.
    ///
    /// `now` and the arming mark are read once, so a timer rearmed from its
    /// own callback waits for a later pass even if already due.
    fn drain_timers(&self) {
        if self.timers.borrow().is_empty() {
            return;
        }

        let now = self.now();
        let mark = self.timers.borrow().seq_mark();

        loop {
            let popped = self.timers.borrow_mut().pop_due(now, mark);
            let Some((id, deadline)) = popped else {
                break;
            };

            let owner = self.timers.borrow().owner(id).cloned();
            let Some(handler) = owner.and_then(|w| w.upgrade()) else {
                self.fatal(Fault::ParticipantGone);
            };

            tracing::trace!(timer = id, ?deadline, "timeout fired");
            handler.borrow_mut().on_timeout();
        }
    }

    /// Whether any fd participant still reports queued output.
    pub(crate) fn has_pending_output(&self) -> bool {
        let owners = self.registry.borrow().owners();

        owners
            .iter()
            .filter_map(Weak::upgrade)
            .any(|handler| handler.borrow().has_pending_output())
    }
}
