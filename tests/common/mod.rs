#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::Duration;

use sysdb_loop::{
    EventLoop, EventLoopBuilder, Interest, ManualClock, PollRequest, Poller, Readiness,
};

/// One recorded call to [`ScriptedPoller::poll`].
#[derive(Clone, Debug)]
pub struct PollCall {
    pub request: PollRequest,
    pub timeout: Option<Duration>,
}

/// A poller that replays scripted results and otherwise "sleeps" by
/// advancing a manual clock through the whole timeout.
pub struct ScriptedPoller {
    clock: ManualClock,
    script: Rc<RefCell<VecDeque<io::Result<Readiness>>>>,
    calls: Rc<RefCell<Vec<PollCall>>>,
}

impl Poller for ScriptedPoller {
    fn poll(&mut self, request: &PollRequest, timeout: Option<Duration>) -> io::Result<Readiness> {
        self.calls.borrow_mut().push(PollCall {
            request: request.clone(),
            timeout,
        });

        if let Some(result) = self.script.borrow_mut().pop_front() {
            return result;
        }

        match timeout {
            Some(timeout) => {
                self.clock.advance(timeout);
                Ok(Readiness::default())
            }
            None => panic!("poll would block forever: nothing scripted and no timeout"),
        }
    }
}

/// An event loop wired to a [`ScriptedPoller`] and a [`ManualClock`].
pub struct Harness {
    pub event_loop: EventLoop,
    pub clock: ManualClock,
    script: Rc<RefCell<VecDeque<io::Result<Readiness>>>>,
    calls: Rc<RefCell<Vec<PollCall>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_builder(EventLoopBuilder::new())
    }

    pub fn with_builder(builder: EventLoopBuilder) -> Self {
        let clock = ManualClock::new();
        let script = Rc::new(RefCell::new(VecDeque::new()));
        let calls = Rc::new(RefCell::new(Vec::new()));

        let poller = ScriptedPoller {
            clock: clock.clone(),
            script: script.clone(),
            calls: calls.clone(),
        };

        let event_loop = builder.poller(poller).clock(clock.clone()).build();

        Self {
            event_loop,
            clock,
            script,
            calls,
        }
    }

    /// Queues a poll result that reports `interest` on `fd`.
    pub fn push_ready(&self, fd: RawFd, interest: Interest) {
        let mut readiness = Readiness::default();
        readiness.insert(fd, interest);
        self.script.borrow_mut().push_back(Ok(readiness));
    }

    /// Queues a poll failure with the given errno.
    pub fn push_errno(&self, errno: i32) {
        self.script
            .borrow_mut()
            .push_back(Err(io::Error::from_raw_os_error(errno)));
    }

    pub fn calls(&self) -> Vec<PollCall> {
        self.calls.borrow().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Shared view of the poll log for participants that need it.
    pub fn poll_log(&self) -> Rc<RefCell<Vec<PollCall>>> {
        self.calls.clone()
    }
}

/// Shared, ordered record of callbacks.
pub type Log = Rc<RefCell<Vec<String>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
