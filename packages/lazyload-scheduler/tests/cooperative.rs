use lazyload_scheduler::{LocalScheduler, Scheduler};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_scheduler_yielding() {
    let scheduler = LocalScheduler::new();

    // Initially idle
    assert!(scheduler.is_idle());
    assert!(!scheduler.tick());

    scheduler.schedule_microtask(Box::new(|| {}));
    assert!(!scheduler.is_idle());

    // Tick drains the queue and nothing else is waiting.
    assert!(!scheduler.tick());
    assert!(scheduler.is_idle());
}

#[test]
fn test_tick_reports_waiting_timers() {
    let scheduler = LocalScheduler::new();
    scheduler.set_timeout(10, Box::new(|| {}));

    assert!(scheduler.tick());
    assert_eq!(scheduler.next_due(), Some(10));
    assert_eq!(scheduler.pending_timers().len(), 1);
}

#[test]
fn test_periodic_poll_is_bounded_by_step_limit() {
    // A self-rescheduling task, the shape of a stylesheet poll loop.
    fn poll(scheduler: Rc<LocalScheduler>, count: Rc<Cell<u32>>) {
        count.set(count.get() + 1);
        let sch = scheduler.clone();
        scheduler.set_timeout(50, Box::new(move || poll(sch, count)));
    }

    let scheduler = Rc::new(LocalScheduler::new());
    let count = Rc::new(Cell::new(0));
    {
        let sch = scheduler.clone();
        let count = count.clone();
        scheduler.set_timeout(50, Box::new(move || poll(sch, count)));
    }

    assert_eq!(scheduler.run_until_idle(10), 10);
    assert_eq!(count.get(), 10);
    assert_eq!(scheduler.now_ms(), 500);
    assert!(!scheduler.is_idle());
}
