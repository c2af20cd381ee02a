use crate::queue::TaskQueue;
use crate::timer::{PendingTimer, TimerQueue};
use crate::{Scheduler, Task};
use std::cell::{Cell, RefCell};

/// Single-threaded scheduler with a virtual clock.
///
/// Nothing runs on its own: callers drive it with [`tick`](Self::tick),
/// [`advance`](Self::advance) or [`run_until_idle`](Self::run_until_idle).
/// This makes every timer-driven path of the loader deterministic under test.
#[derive(Default)]
pub struct LocalScheduler {
    now: Cell<u64>,
    microtasks: TaskQueue,
    timers: RefCell<TimerQueue>,
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now.get()
    }

    pub fn is_idle(&self) -> bool {
        self.microtasks.is_empty() && self.timers.borrow().is_empty()
    }

    /// Drains the microtask queue. Returns true if timers are still waiting.
    pub fn tick(&self) -> bool {
        self.microtasks.drain();
        !self.timers.borrow().is_empty()
    }

    /// Moves the clock forward by `delta_ms`, firing every timer that comes due on the way.
    /// Returns the number of timers that ran.
    pub fn advance(&self, delta_ms: u64) -> usize {
        let target = self.now.get().saturating_add(delta_ms);
        let ran = self.run_due(target);
        self.now.set(target);
        self.microtasks.drain();
        tracing::trace!(now = target, ran, "scheduler advanced");
        ran
    }

    /// Jumps from timer to timer until nothing is scheduled or `max_steps` timers have run.
    pub fn run_until_idle(&self, max_steps: usize) -> usize {
        let mut steps = 0;
        self.microtasks.drain();
        while steps < max_steps {
            let Some(due) = self.next_due() else {
                break;
            };
            // Only the earliest timer; it may schedule something even earlier than the rest.
            let popped = self.timers.borrow_mut().pop_due(due);
            let Some((due_at, task)) = popped else {
                break;
            };
            self.now.set(due_at);
            task();
            self.microtasks.drain();
            steps += 1;
        }
        steps
    }

    pub fn next_due(&self) -> Option<u64> {
        self.timers.borrow().next_due()
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        self.timers.borrow().pending()
    }

    fn run_due(&self, target: u64) -> usize {
        let mut ran = 0;
        loop {
            self.microtasks.drain();
            // Release the borrow before running: the task may schedule more timers.
            let popped = self.timers.borrow_mut().pop_due(target);
            let Some((due_at, task)) = popped else {
                break;
            };
            self.now.set(due_at.max(self.now.get()));
            task();
            ran += 1;
        }
        ran
    }
}

impl Scheduler for LocalScheduler {
    fn schedule_microtask(&self, task: Task) {
        self.microtasks.push(task);
    }

    fn set_timeout(&self, delay_ms: u32, task: Task) {
        let due_at = self.now.get().saturating_add(u64::from(delay_ms));
        self.timers.borrow_mut().push(due_at, task);
    }

    fn now(&self) -> f64 {
        self.now.get() as f64
    }
}
