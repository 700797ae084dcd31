//! # sysdb-loop
//!
//! **sysdb-loop** is the event scheduler embedded in a Sysdb client agent:
//! a single-threaded reactor that waits for readiness on file descriptors,
//! fires deadline timers, and can hand both over to a foreign event loop.
//!
//! It provides:
//!
//! - **Descriptor interest** per participant (readable / writable /
//!   exceptional), aggregated into one `select(2)` call per iteration
//! - **Timers** with one pending deadline per owner, fired in ascending
//!   deadline order and never early
//! - **Run control**: bounded runs, `run_forever`/`stop`, a one-time
//!   initialization dispatch and a pre-exit `flush`
//! - **External loop adapters** that receive every interest and deadline
//!   change and drive the callbacks themselves
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! use sysdb_loop::{EventLoop, TimeoutHandler, Timer};
//!
//! struct Heartbeat {
//!     beats: u32,
//!     timer: Option<Timer>,
//! }
//!
//! impl TimeoutHandler for Heartbeat {
//!     fn on_timeout(&mut self) {
//!         self.beats += 1;
//!     }
//! }
//!
//! let event_loop = EventLoop::new();
//! let handle = event_loop.handle();
//!
//! let heartbeat = Rc::new(RefCell::new(Heartbeat { beats: 0, timer: None }));
//! let timer = handle.timer(Rc::downgrade(&heartbeat));
//! timer.timeout_time_is(handle.now() + Duration::from_millis(100));
//! heartbeat.borrow_mut().timer = Some(timer);
//!
//! event_loop.run(Duration::from_millis(200));
//! assert_eq!(heartbeat.borrow().beats, 1);
//! ```
//!
//! ## Modules
//!
//! - [`time`]: Monotonic time and clocks
//! - [`fault`]: Fault taxonomy and the fatal reporting path

mod handler;
mod reactor;
mod runtime;
mod utils;

pub mod fault;
pub mod time;

pub use fault::Fault;
pub use handler::{FdHandler, InitHandler, TimeoutHandler};
pub use reactor::core::LoopState;
pub use reactor::event::{PollRequest, Readiness};
pub use reactor::external::ExternalLoop;
pub use reactor::poller::Poller;
pub use reactor::poller::common::Interest;
pub use reactor::poller::select::SelectPoller;
pub use runtime::EventLoop;
pub use runtime::builder::EventLoopBuilder;
pub use runtime::handle::{FdWatcher, InitWatcher, LoopHandle, Timer};
pub use time::{Clock, ManualClock, MonoTime, SystemClock};
