mod common;

use std::cell::RefCell;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::Duration;

use common::{Harness, Log, log, ms};
use sysdb_loop::{ExternalLoop, FdHandler, InitHandler, TimeoutHandler};

#[derive(Clone, Debug, PartialEq)]
enum Call {
    Readable(RawFd, bool),
    Writable(RawFd, bool),
    Exception(RawFd, bool),
    Deadline(Option<Duration>),
}

/// Adapter that records every request instead of driving a foreign loop.
struct Recorder {
    calls: Rc<RefCell<Vec<Call>>>,
}

impl ExternalLoop for Recorder {
    fn watch_readable(&mut self, fd: RawFd, interested: bool) {
        self.calls.borrow_mut().push(Call::Readable(fd, interested));
    }

    fn watch_writable(&mut self, fd: RawFd, interested: bool) {
        self.calls.borrow_mut().push(Call::Writable(fd, interested));
    }

    fn watch_exception(&mut self, fd: RawFd, interested: bool) {
        self.calls.borrow_mut().push(Call::Exception(fd, interested));
    }

    fn deadline_is(&mut self, after: Option<Duration>) {
        self.calls.borrow_mut().push(Call::Deadline(after));
    }
}

fn install(harness: &Harness) -> Rc<RefCell<Vec<Call>>> {
    let calls = Rc::new(RefCell::new(Vec::new()));
    harness.event_loop.external_loop_is(Recorder {
        calls: calls.clone(),
    });
    calls
}

struct Participant {
    log: Log,
}

impl FdHandler for Participant {
    fn on_readable(&mut self, fd: RawFd) {
        self.log.borrow_mut().push(format!("read {fd}"));
    }

    fn on_writable(&mut self, fd: RawFd) {
        self.log.borrow_mut().push(format!("write {fd}"));
    }
}

impl TimeoutHandler for Participant {
    fn on_timeout(&mut self) {
        self.log.borrow_mut().push("timeout".to_string());
    }
}

impl InitHandler for Participant {
    fn on_initialized(&mut self) {
        self.log.borrow_mut().push("init".to_string());
    }
}

fn participant(log: &Log) -> Rc<RefCell<Participant>> {
    Rc::new(RefCell::new(Participant { log: log.clone() }))
}

#[test]
fn only_aggregate_flips_are_forwarded() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let calls = install(&harness);
    calls.borrow_mut().clear();

    let seen = log();
    let (a, b) = (participant(&seen), participant(&seen));
    let watcher_a = handle.fd_watcher(Rc::downgrade(&a));
    let watcher_b = handle.fd_watcher(Rc::downgrade(&b));

    watcher_a.watch_readable(4, true);
    watcher_b.watch_readable(4, true);
    watcher_a.watch_readable(4, true);
    assert_eq!(*calls.borrow(), vec![Call::Readable(4, true)]);

    watcher_a.watch_readable(4, false);
    assert_eq!(calls.borrow().len(), 1);

    watcher_b.watch_readable(4, false);
    assert_eq!(
        *calls.borrow(),
        vec![Call::Readable(4, true), Call::Readable(4, false)]
    );
}

#[test]
fn dropping_the_last_watcher_withdraws_its_flags() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let calls = install(&harness);

    let seen = log();
    let owner = participant(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_writable(6, true);
    watcher.watch_exception(6, true);
    calls.borrow_mut().clear();

    drop(watcher);

    let mut withdrawn = calls.borrow().clone();
    withdrawn.sort_by_key(|call| format!("{call:?}"));
    assert_eq!(
        withdrawn,
        vec![Call::Exception(6, false), Call::Writable(6, false)]
    );
}

#[test]
fn install_replays_current_interest_and_deadline() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();

    let seen = log();
    let owner = participant(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_readable(3, true);
    watcher.watch_writable(3, true);
    watcher.watch_readable(11, true);

    let timer = handle.timer(Rc::downgrade(&owner));
    timer.timeout_time_is(handle.now() + ms(50));

    let calls = install(&harness);

    assert_eq!(
        *calls.borrow(),
        vec![
            Call::Readable(3, true),
            Call::Writable(3, true),
            Call::Readable(11, true),
            Call::Deadline(Some(ms(50))),
        ]
    );
}

#[test]
fn deadline_changes_are_forwarded_relative_to_now() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let calls = install(&harness);
    assert_eq!(*calls.borrow(), vec![Call::Deadline(None)]);
    calls.borrow_mut().clear();

    let seen = log();
    let owner = participant(&seen);
    let timer = handle.timer(Rc::downgrade(&owner));

    harness.clock.advance(ms(500));
    timer.timeout_time_is(handle.now() + ms(30));
    timer.cancel();
    timer.timeout_time_is(handle.now() + ms(70));
    drop(timer);

    assert_eq!(
        *calls.borrow(),
        vec![
            Call::Deadline(Some(ms(30))),
            Call::Deadline(None),
            Call::Deadline(Some(ms(70))),
            Call::Deadline(None),
        ]
    );
}

#[test]
fn early_timeout_notification_fires_nothing() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let calls = install(&harness);

    let seen = log();
    let owner = participant(&seen);
    let timer = handle.timer(Rc::downgrade(&owner));
    timer.timeout_time_is(handle.now() + ms(100));
    calls.borrow_mut().clear();

    harness.clock.advance(ms(40));
    handle.on_timeout();
    assert!(seen.borrow().is_empty());
    assert_eq!(*calls.borrow(), vec![Call::Deadline(Some(ms(60)))]);

    harness.clock.advance(ms(60));
    handle.on_timeout();
    assert_eq!(*seen.borrow(), vec!["timeout"]);
    assert_eq!(calls.borrow().last(), Some(&Call::Deadline(None)));
}

#[test]
fn readiness_from_the_foreign_loop_is_dispatched() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let _calls = install(&harness);

    let seen = log();
    let owner = participant(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_readable(9, true);

    handle.on_readable(9);
    handle.on_writable(9);
    handle.on_readable(10);

    assert_eq!(*seen.borrow(), vec!["read 9"]);
}

#[test]
fn initialization_precedes_installation() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();

    let seen = log();
    let owner = participant(&seen);
    let _subscription = handle.init_watcher(Rc::downgrade(&owner));

    let calls = install(&harness);

    assert_eq!(*seen.borrow(), vec!["init"]);
    assert!(harness.event_loop.is_initialized());
    assert_eq!(*calls.borrow(), vec![Call::Deadline(None)]);
}

#[test]
fn cleared_adapter_stops_receiving_changes() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let calls = install(&harness);
    assert!(harness.event_loop.has_external_loop());

    assert!(harness.event_loop.clear_external_loop().is_some());
    assert!(!harness.event_loop.has_external_loop());
    calls.borrow_mut().clear();

    let seen = log();
    let owner = participant(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_readable(2, true);

    assert!(calls.borrow().is_empty());

    // The internal loop takes over again.
    harness.push_ready(2, sysdb_loop::Interest::READABLE);
    harness.event_loop.run(ms(0));
    assert_eq!(*seen.borrow(), vec!["read 2"]);
}
