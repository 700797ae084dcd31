use super::poller::common::Interest;

use std::collections::BTreeSet;
use std::os::fd::RawFd;

/// The aggregate readiness request for one poll.
///
/// Built by the registry from every participant's interest set. The three
/// sets mirror what descriptor-set based primitives such as `select(2)`
/// take, and `max_fd` is the highest descriptor in any of them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PollRequest {
    /// Descriptors watched for readability.
    pub read: BTreeSet<RawFd>,

    /// Descriptors watched for writability.
    pub write: BTreeSet<RawFd>,

    /// Descriptors watched for exceptional conditions.
    pub except: BTreeSet<RawFd>,

    /// Highest descriptor across all three sets, `None` if all are empty.
    pub max_fd: Option<RawFd>,
}

impl PollRequest {
    /// Adds `fd` to every set named by `interest`.
    pub fn insert(&mut self, fd: RawFd, interest: Interest) {
        if interest.is_empty() {
            return;
        }

        if interest.contains(Interest::READABLE) {
            self.read.insert(fd);
        }
        if interest.contains(Interest::WRITABLE) {
            self.write.insert(fd);
        }
        if interest.contains(Interest::EXCEPTIONAL) {
            self.except.insert(fd);
        }

        self.max_fd = Some(self.max_fd.map_or(fd, |m| m.max(fd)));
    }

    /// Returns the flags requested for `fd`.
    pub fn interest(&self, fd: RawFd) -> Interest {
        let mut interest = Interest::NONE;

        if self.read.contains(&fd) {
            interest |= Interest::READABLE;
        }
        if self.write.contains(&fd) {
            interest |= Interest::WRITABLE;
        }
        if self.except.contains(&fd) {
            interest |= Interest::EXCEPTIONAL;
        }

        interest
    }

    /// Returns `true` if no descriptor is watched.
    pub fn is_empty(&self) -> bool {
        self.max_fd.is_none()
    }

    /// Iterates every distinct descriptor in the request, ascending.
    pub fn fds(&self) -> impl Iterator<Item = RawFd> + use<> {
        let all: BTreeSet<RawFd> = self
            .read
            .iter()
            .chain(&self.write)
            .chain(&self.except)
            .copied()
            .collect();

        all.into_iter()
    }
}

/// Readiness reported by one poll.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Readiness {
    /// Descriptors reported readable.
    pub read: BTreeSet<RawFd>,

    /// Descriptors reported writable.
    pub write: BTreeSet<RawFd>,

    /// Descriptors reported with an exceptional condition.
    pub except: BTreeSet<RawFd>,
}

impl Readiness {
    /// Marks `fd` ready for every flag in `interest`.
    pub fn insert(&mut self, fd: RawFd, interest: Interest) {
        if interest.contains(Interest::READABLE) {
            self.read.insert(fd);
        }
        if interest.contains(Interest::WRITABLE) {
            self.write.insert(fd);
        }
        if interest.contains(Interest::EXCEPTIONAL) {
            self.except.insert(fd);
        }
    }

    /// Returns the flags `fd` was reported ready for.
    pub fn ready(&self, fd: RawFd) -> Interest {
        let mut interest = Interest::NONE;

        if self.read.contains(&fd) {
            interest |= Interest::READABLE;
        }
        if self.write.contains(&fd) {
            interest |= Interest::WRITABLE;
        }
        if self.except.contains(&fd) {
            interest |= Interest::EXCEPTIONAL;
        }

        interest
    }

    /// Returns `true` if nothing was reported ready.
    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty() && self.except.is_empty()
    }
}
