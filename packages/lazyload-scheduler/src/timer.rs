use crate::Task;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

struct TimerEntry {
    due_at: u64,
    seq: u64,
    task: Task,
}

// Ordered by due time, then by insertion so equal deadlines fire FCFS.
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due_at == other.due_at && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due_at, self.seq).cmp(&(other.due_at, other.seq))
    }
}

/// A timer that has been scheduled but has not fired yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub due_at: u64,
    pub order: u64,
}

/// Min-heap of timers keyed on `(due_at, insertion order)`.
#[derive(Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, due_at: u64, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(TimerEntry { due_at, seq, task }));
    }

    /// Removes the earliest timer if it is due at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<(u64, Task)> {
        match self.heap.peek() {
            Some(Reverse(entry)) if entry.due_at <= now => {}
            _ => return None,
        }
        self.heap
            .pop()
            .map(|Reverse(entry)| (entry.due_at, entry.task))
    }

    pub fn next_due(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(entry)| entry.due_at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn pending(&self) -> Vec<PendingTimer> {
        let mut timers: Vec<_> = self
            .heap
            .iter()
            .map(|Reverse(entry)| PendingTimer {
                due_at: entry.due_at,
                order: entry.seq,
            })
            .collect();
        timers.sort_by_key(|timer| (timer.due_at, timer.order));
        timers
    }
}
