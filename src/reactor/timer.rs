use crate::time::MonoTime;
use crate::utils::Slab;

/// A timer owner and its single pending deadline.
///
/// `deadline == MonoTime::NEVER` means the owner is not in the heap.
pub(crate) struct TimerEntry<T> {
    /// Callback target, stored however the caller likes (typically weakly).
    pub(crate) owner: T,

    /// The time at which the timer should fire.
    pub(crate) deadline: MonoTime,

    /// Arming order. Breaks deadline ties and lets a drain skip timers
    /// armed after it started.
    pub(crate) seq: u64,
}

/// Min-heap of pending deadlines, keyed by timer identity.
///
/// Owners live in a slab and the heap holds slab indices, ordered by
/// `(deadline, seq)`. Each owner appears in the heap at most once.
///
/// Rearming an already pending timer re-heapifies the whole vector and
/// cancelling scans for the owner's position. Both are O(n), which is
/// fine for agent-scale timer counts.
pub(crate) struct TimerHeap<T> {
    entries: Slab<TimerEntry<T>>,
    heap: Vec<usize>,
    next_seq: u64,
}

impl<T> TimerHeap<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Slab::new(16),
            heap: Vec::new(),
            next_seq: 0,
        }
    }

    /// Registers an owner with no pending deadline.
    pub(crate) fn insert_owner(&mut self, owner: T) -> usize {
        self.entries.insert(TimerEntry {
            owner,
            deadline: MonoTime::NEVER,
            seq: 0,
        })
    }

    /// Unregisters an owner, cancelling its pending deadline.
    pub(crate) fn remove_owner(&mut self, id: usize) -> Option<T> {
        if !self.entries.contains(id) {
            return None;
        }

        self.timeout_is(id, MonoTime::NEVER);
        self.entries.remove(id).map(|entry| entry.owner)
    }

    pub(crate) fn owner(&self, id: usize) -> Option<&T> {
        self.entries.get(id).map(|entry| &entry.owner)
    }

    /// Pending deadline of `id`, [`MonoTime::NEVER`] if unarmed or unknown.
    pub(crate) fn deadline(&self, id: usize) -> MonoTime {
        self.entries
            .get(id)
            .map_or(MonoTime::NEVER, |entry| entry.deadline)
    }

    /// Number of pending deadlines.
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The sequence number the next arming will receive.
    ///
    /// Every timer armed before this call has a smaller number.
    pub(crate) fn seq_mark(&self) -> u64 {
        self.next_seq
    }

    /// Sets, replaces or (with `NEVER`) cancels the deadline of `id`.
    ///
    /// Returns `false` if `id` is not registered.
    pub(crate) fn timeout_is(&mut self, id: usize, deadline: MonoTime) -> bool {
        let seq = self.next_seq;
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };

        let previous = entry.deadline;
        entry.deadline = deadline;
        if !deadline.is_never() {
            entry.seq = seq;
            self.next_seq += 1;
        }

        match (previous.is_never(), deadline.is_never()) {
            (true, true) => {}
            (true, false) => {
                self.heap.push(id);
                self.sift_up(self.heap.len() - 1);
            }
            (false, true) => {
                if let Some(pos) = self.heap.iter().position(|&i| i == id) {
                    self.remove_at(pos);
                }
            }
            (false, false) => self.make_heap(),
        }

        true
    }

    /// The earliest pending timer and its deadline.
    pub(crate) fn peek_min(&self) -> Option<(usize, MonoTime)> {
        let &id = self.heap.first()?;
        Some((id, self.deadline(id)))
    }

    /// Removes the earliest pending timer, leaving its owner registered but
    /// unarmed.
    pub(crate) fn pop_min(&mut self) -> Option<(usize, MonoTime)> {
        if self.heap.is_empty() {
            return None;
        }

        let id = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }

        let entry = self.entries.get_mut(id)?;
        let deadline = entry.deadline;
        entry.deadline = MonoTime::NEVER;

        Some((id, deadline))
    }

    /// Pops the earliest timer that is due at `now` and was armed before
    /// `seq_limit`, leaving its owner registered but unarmed.
    ///
    /// Timers armed at or after `seq_limit` are stepped over, not waited
    /// on, so repeated calls drain every older overdue timer in ascending
    /// deadline order.
    pub(crate) fn pop_due(&mut self, now: MonoTime, seq_limit: u64) -> Option<(usize, MonoTime)> {
        let eligible = |key: (MonoTime, u64)| key.0 <= now && key.1 < seq_limit;

        let (_, deadline) = self.peek_min()?;
        if deadline > now {
            return None;
        }
        if eligible(self.key(self.heap[0])) {
            return self.pop_min();
        }

        let (pos, id) = self
            .heap
            .iter()
            .enumerate()
            .map(|(pos, &id)| (pos, id))
            .filter(|&(_, id)| eligible(self.key(id)))
            .min_by_key(|&(_, id)| self.key(id))?;

        self.remove_at(pos);

        let entry = self.entries.get_mut(id)?;
        let deadline = entry.deadline;
        entry.deadline = MonoTime::NEVER;

        Some((id, deadline))
    }

    /// Drops the heap slot at `pos` and restores heap order.
    fn remove_at(&mut self, pos: usize) {
        self.heap.swap_remove(pos);
        self.make_heap();
    }

    fn key(&self, id: usize) -> (MonoTime, u64) {
        self.entries
            .get(id)
            .map_or((MonoTime::NEVER, u64::MAX), |entry| (entry.deadline, entry.seq))
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.key(self.heap[a]) < self.key(self.heap[b])
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.less(pos, parent) {
                break;
            }
            self.heap.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();

        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;

            if left < len && self.less(left, smallest) {
                smallest = left;
            }
            if right < len && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == pos {
                break;
            }

            self.heap.swap(pos, smallest);
            pos = smallest;
        }
    }

    fn make_heap(&mut self) {
        for pos in (0..self.heap.len() / 2).rev() {
            self.sift_down(pos);
        }
    }
}
