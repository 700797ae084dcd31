mod common;

use std::cell::RefCell;
use std::os::fd::RawFd;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use common::{Harness, Log, log, ms};
use sysdb_loop::{
    EventLoop, EventLoopBuilder, Fault, FdHandler, FdWatcher, Interest, TimeoutHandler,
};

struct Reader {
    log: Log,
}

impl FdHandler for Reader {
    fn on_readable(&mut self, fd: RawFd) {
        self.log.borrow_mut().push(format!("read {fd}"));
    }

    fn on_writable(&mut self, fd: RawFd) {
        self.log.borrow_mut().push(format!("write {fd}"));
    }

    fn on_exception(&mut self, fd: RawFd) {
        self.log.borrow_mut().push(format!("except {fd}"));
    }
}

fn reader(log: &Log) -> Rc<RefCell<Reader>> {
    Rc::new(RefCell::new(Reader { log: log.clone() }))
}

#[test]
fn readable_descriptor_is_dispatched_once() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let seen = log();

    let owner = reader(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_readable(7, true);

    harness.push_ready(7, Interest::READABLE);
    harness.event_loop.run(ms(0));

    assert_eq!(*seen.borrow(), vec!["read 7"]);

    let calls = harness.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].request.read.contains(&7));
    assert_eq!(calls[0].request.max_fd, Some(7));
}

#[test]
fn only_watched_flags_are_dispatched() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let seen = log();

    let owner = reader(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_writable(4, true);

    harness.push_ready(4, Interest::READABLE | Interest::WRITABLE | Interest::EXCEPTIONAL);
    harness.event_loop.run(ms(0));

    assert_eq!(*seen.borrow(), vec!["write 4"]);
}

#[test]
fn every_watcher_of_a_descriptor_is_called() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let (first_log, second_log) = (log(), log());

    let first = reader(&first_log);
    let second = reader(&second_log);
    let first_watcher = handle.fd_watcher(Rc::downgrade(&first));
    let second_watcher = handle.fd_watcher(Rc::downgrade(&second));
    first_watcher.watch_readable(5, true);
    second_watcher.watch_readable(5, true);
    second_watcher.watch_exception(5, true);

    harness.push_ready(5, Interest::READABLE | Interest::EXCEPTIONAL);
    harness.event_loop.run(ms(0));

    assert_eq!(*first_log.borrow(), vec!["read 5"]);
    assert_eq!(*second_log.borrow(), vec!["read 5", "except 5"]);
}

struct Alarm {
    log: Log,
}

impl TimeoutHandler for Alarm {
    fn on_timeout(&mut self) {
        self.log.borrow_mut().push("timeout".to_string());
    }
}

#[test]
fn descriptor_callbacks_precede_timers_in_an_iteration() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let seen = log();

    // Armed first and already overdue, so only dispatch order decides.
    let alarm = Rc::new(RefCell::new(Alarm { log: seen.clone() }));
    let timer = handle.timer(Rc::downgrade(&alarm));
    timer.timeout_time_is(handle.now());
    harness.clock.advance(ms(5));

    let owner = reader(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_readable(7, true);

    harness.push_ready(7, Interest::READABLE);
    harness.event_loop.run(ms(0));

    assert_eq!(*seen.borrow(), vec!["read 7", "timeout"]);
    assert_eq!(harness.event_loop.iterations(), 1);
}

#[test]
fn withdrawn_interest_leaves_the_request() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let seen = log();

    let owner = reader(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.interest_is(9, true, Interest::READABLE | Interest::WRITABLE);
    watcher.watch_readable(3, true);
    assert_eq!(harness.event_loop.poll_request().max_fd, Some(9));

    watcher.watch_readable(9, false);
    let request = harness.event_loop.poll_request();
    assert!(!request.read.contains(&9));
    assert!(request.write.contains(&9));

    watcher.watch_writable(9, false);
    let request = harness.event_loop.poll_request();
    assert_eq!(request.fds().collect::<Vec<_>>(), vec![3]);
    assert_eq!(request.max_fd, Some(3));
    assert_eq!(watcher.fds(), vec![3]);
}

#[test]
fn dropping_the_watcher_withdraws_everything() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let seen = log();

    let owner = reader(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_readable(6, true);
    drop(watcher);

    assert!(harness.event_loop.poll_request().is_empty());
}

struct Closer {
    log: Log,
    other: Option<FdWatcher>,
}

impl FdHandler for Closer {
    fn on_readable(&mut self, fd: RawFd) {
        self.log.borrow_mut().push(format!("closer {fd}"));
        self.other = None;
    }
}

#[test]
fn participant_removed_mid_dispatch_is_skipped() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let seen = log();

    let closer = Rc::new(RefCell::new(Closer {
        log: seen.clone(),
        other: None,
    }));
    let closer_watcher = handle.fd_watcher(Rc::downgrade(&closer));
    closer_watcher.watch_readable(8, true);

    let victim = reader(&seen);
    let victim_watcher = handle.fd_watcher(Rc::downgrade(&victim));
    victim_watcher.watch_readable(8, true);
    closer.borrow_mut().other = Some(victim_watcher);

    harness.push_ready(8, Interest::READABLE);
    harness.event_loop.run(ms(0));

    assert_eq!(*seen.borrow(), vec!["closer 8"]);
}

#[test]
fn interrupted_wait_is_retried_without_callbacks() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let seen = log();

    let owner = reader(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_readable(7, true);

    harness.push_errno(libc::EINTR);
    harness.event_loop.run(ms(0));
    assert!(seen.borrow().is_empty());
    assert_eq!(harness.event_loop.iterations(), 1);

    harness.push_ready(7, Interest::READABLE);
    harness.event_loop.run(ms(0));
    assert_eq!(*seen.borrow(), vec!["read 7"]);
}

#[test]
fn interrupted_wait_still_fires_due_timers() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let seen = log();

    let owner = reader(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_readable(7, true);

    let alarm = Rc::new(RefCell::new(Alarm { log: seen.clone() }));
    let timer = handle.timer(Rc::downgrade(&alarm));
    timer.timeout_time_is(handle.now());

    harness.push_errno(libc::EINTR);
    harness.event_loop.run(ms(0));

    assert_eq!(*seen.borrow(), vec!["timeout"]);
}

#[test]
#[should_panic(expected = "out of range")]
fn negative_descriptor_is_fatal() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let seen = log();

    let owner = reader(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_readable(-1, true);
}

#[test]
#[should_panic(expected = "callback target destroyed")]
fn destroyed_owner_with_ready_descriptor_is_fatal() {
    let harness = Harness::new();
    let handle = harness.event_loop.handle();
    let seen = log();

    let owner = reader(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_readable(7, true);
    drop(owner);

    harness.push_ready(7, Interest::READABLE);
    harness.event_loop.run(ms(0));
}

fn pipe() -> (RawFd, RawFd) {
    let mut fds = [0; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(rc, 0, "pipe: {}", std::io::Error::last_os_error());
    (fds[0], fds[1])
}

fn close(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

#[test]
fn select_reports_a_readable_pipe() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();
    let seen = log();
    let (read_end, write_end) = pipe();

    let owner = reader(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_readable(read_end, true);

    event_loop.run(ms(0));
    assert!(seen.borrow().is_empty());

    let written = unsafe { libc::write(write_end, b"x".as_ptr().cast(), 1) };
    assert_eq!(written, 1);

    event_loop.run(ms(0));
    assert_eq!(*seen.borrow(), vec![format!("read {read_end}")]);

    drop(watcher);
    close(read_end);
    close(write_end);
}

#[test]
fn select_reports_a_writable_pipe() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();
    let seen = log();
    let (read_end, write_end) = pipe();

    let owner = reader(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_writable(write_end, true);

    event_loop.run(ms(0));
    assert_eq!(*seen.borrow(), vec![format!("write {write_end}")]);

    drop(watcher);
    close(read_end);
    close(write_end);
}

#[test]
fn closed_descriptor_is_fatal_and_reported_to_the_hook() {
    // Far above anything the test process opens.
    const CLOSED: RawFd = 1000;

    let reported = Rc::new(RefCell::new(None));
    let sink = reported.clone();
    let event_loop = EventLoopBuilder::new()
        .fault_hook(move |fault| *sink.borrow_mut() = Some(fault.to_string()))
        .build();
    let handle = event_loop.handle();
    let seen = log();

    let owner = reader(&seen);
    let watcher = handle.fd_watcher(Rc::downgrade(&owner));
    watcher.watch_readable(CLOSED, true);

    let result = catch_unwind(AssertUnwindSafe(|| event_loop.run(ms(0))));

    assert!(result.is_err());
    assert_eq!(
        reported.borrow().as_deref(),
        Some(Fault::BadDescriptor(CLOSED).to_string().as_str())
    );
    assert!(seen.borrow().is_empty());
}
