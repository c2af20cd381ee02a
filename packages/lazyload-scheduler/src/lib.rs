pub mod queue;
pub mod scheduler;
pub mod timer;

/// A unit of deferred work. The loader is single-threaded, so tasks are not `Send`.
pub type Task = Box<dyn FnOnce()>;

/// Timing primitives the loader needs from its host.
/// A browser maps these onto `queueMicrotask`/`setTimeout`; tests use [`LocalScheduler`].
pub trait Scheduler {
    /// Schedule a microtask (runs before any timer, after the current call stack unwinds).
    fn schedule_microtask(&self, task: Task);

    /// Run `task` once, no earlier than `delay_ms` from now.
    fn set_timeout(&self, delay_ms: u32, task: Task);

    /// Get the current time in milliseconds (monotonic).
    fn now(&self) -> f64;
}

pub use queue::TaskQueue;
pub use scheduler::LocalScheduler;
pub use timer::{PendingTimer, TimerQueue};
