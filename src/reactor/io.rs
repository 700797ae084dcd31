use super::event::PollRequest;
use super::poller::common::Interest;
use crate::utils::Slab;

use std::collections::BTreeMap;
use std::os::fd::RawFd;

/// The descriptors one participant watches, and for which conditions.
///
/// A descriptor whose mask becomes empty is dropped from the map, so
/// iteration cost follows active interest only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct InterestSet {
    fds: BTreeMap<RawFd, Interest>,
}

impl InterestSet {
    /// Adds (`want`) or removes `flag` on `fd`.
    ///
    /// Returns the mask before and after the change.
    pub(crate) fn interest_is(&mut self, fd: RawFd, want: bool, flag: Interest) -> (Interest, Interest) {
        let before = self.get(fd);
        let after = if want {
            before.with(flag)
        } else {
            before.without(flag)
        };

        if after.is_empty() {
            self.fds.remove(&fd);
        } else {
            self.fds.insert(fd, after);
        }

        (before, after)
    }

    /// Returns the mask currently tracked for `fd`.
    pub(crate) fn get(&self, fd: RawFd) -> Interest {
        self.fds.get(&fd).copied().unwrap_or(Interest::NONE)
    }

    /// Iterates tracked descriptors in ascending order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (RawFd, Interest)> + '_ {
        self.fds.iter().map(|(&fd, &interest)| (fd, interest))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Adds every tracked descriptor to `request`.
    pub(crate) fn update_request(&self, request: &mut PollRequest) {
        for (fd, interest) in self.iter() {
            request.insert(fd, interest);
        }
    }
}

/// A registered fd participant: its callback target and its interest set.
pub(crate) struct Participant<T> {
    pub(crate) owner: T,
    pub(crate) interest: InterestSet,
}

/// One participant's view of a poll, captured before dispatch.
pub(crate) struct Snapshot<T> {
    pub(crate) id: usize,
    pub(crate) owner: T,
    pub(crate) interest: InterestSet,
}

/// Aggregates every participant's interest set.
///
/// Participants are addressed by the slab index handed out at
/// registration. The registry never owns the callback target itself;
/// `T` is whatever non-owning reference the caller stores.
pub(crate) struct Registry<T> {
    participants: Slab<Participant<T>>,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            participants: Slab::new(16),
        }
    }

    /// Registers a participant with an empty interest set.
    pub(crate) fn insert(&mut self, owner: T) -> usize {
        self.participants.insert(Participant {
            owner,
            interest: InterestSet::default(),
        })
    }

    /// Removes a participant.
    ///
    /// Returns every `(fd, flag)` pair no remaining participant watches any
    /// more, so callers mirroring aggregate interest elsewhere can withdraw it.
    pub(crate) fn remove(&mut self, id: usize) -> Vec<(RawFd, Interest)> {
        let Some(removed) = self.participants.remove(id) else {
            return Vec::new();
        };

        let mut withdrawn = Vec::new();
        for (fd, interest) in removed.interest.iter() {
            let still = self.aggregate(fd);
            for flag in interest.iter() {
                if !still.contains(flag) {
                    withdrawn.push((fd, flag));
                }
            }
        }

        withdrawn
    }

    pub(crate) fn len(&self) -> usize {
        self.participants.len()
    }

    pub(crate) fn get(&self, id: usize) -> Option<&Participant<T>> {
        self.participants.get(id)
    }

    /// Adds or removes `flag` on `fd` for participant `id`.
    ///
    /// Returns `Some(now_watched)` when the aggregate interest in `(fd, flag)`
    /// across all participants flipped, `None` otherwise. An unknown `id` is
    /// ignored.
    pub(crate) fn interest_is(&mut self, id: usize, fd: RawFd, want: bool, flag: Interest) -> Option<bool> {
        let aggregate_before = self.aggregate(fd).contains(flag);

        let participant = self.participants.get_mut(id)?;
        let (before, after) = participant.interest.interest_is(fd, want, flag);
        if before == after {
            return None;
        }

        let aggregate_after = self.aggregate(fd).contains(flag);
        (aggregate_before != aggregate_after).then_some(aggregate_after)
    }

    /// Union of every participant's mask on `fd`.
    pub(crate) fn aggregate(&self, fd: RawFd) -> Interest {
        self.participants
            .iter()
            .fold(Interest::NONE, |acc, (_, p)| acc.with(p.interest.get(fd)))
    }

    /// Builds the readiness request covering every participant.
    pub(crate) fn build_request(&self) -> PollRequest {
        let mut request = PollRequest::default();

        for (_, participant) in self.participants.iter() {
            participant.interest.update_request(&mut request);
        }

        request
    }
}

impl<T: Clone> Registry<T> {
    /// Copies every participant with non-empty interest.
    ///
    /// Dispatch walks the copy, so callbacks that change interest only
    /// affect the next poll.
    pub(crate) fn snapshot(&self) -> Vec<Snapshot<T>> {
        self.participants
            .iter()
            .filter(|(_, p)| !p.interest.is_empty())
            .map(|(id, p)| Snapshot {
                id,
                owner: p.owner.clone(),
                interest: p.interest.clone(),
            })
            .collect()
    }

    /// Every registered participant, idle ones included.
    pub(crate) fn owners(&self) -> Vec<T> {
        self.participants
            .iter()
            .map(|(_, p)| p.owner.clone())
            .collect()
    }

    /// Participants currently watching `flag` on `fd`.
    pub(crate) fn watchers(&self, fd: RawFd, flag: Interest) -> Vec<(usize, T)> {
        self.participants
            .iter()
            .filter(|(_, p)| p.interest.get(fd).contains(flag))
            .map(|(id, p)| (id, p.owner.clone()))
            .collect()
    }
}
