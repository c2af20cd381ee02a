use crate::Task;
use std::cell::RefCell;
use std::collections::VecDeque;

/// A simple FIFO queue for microtasks.
/// Since LocalScheduler is single-threaded, we use RefCell<VecDeque>.
#[derive(Default)]
pub struct TaskQueue {
    queue: RefCell<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
        }
    }

    pub fn push(&self, task: Task) {
        self.queue.borrow_mut().push_back(task);
    }

    pub fn pop(&self) -> Option<Task> {
        self.queue.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Runs tasks until the queue is empty, including tasks queued by the tasks themselves.
    /// Returns the number of tasks that ran.
    pub fn drain(&self) -> usize {
        // Pop one at a time so the borrow is released before each task runs.
        let mut ran = 0;
        while let Some(task) = self.pop() {
            task();
            ran += 1;
        }
        ran
    }
}
