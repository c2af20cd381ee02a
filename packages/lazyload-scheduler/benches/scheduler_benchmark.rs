use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lazyload_scheduler::{LocalScheduler, Scheduler};

fn benchmark_microtasks(c: &mut Criterion) {
    c.bench_function("schedule_microtask 1000", |b| {
        b.iter(|| {
            let scheduler = LocalScheduler::new();
            for _ in 0..1000 {
                scheduler.schedule_microtask(Box::new(|| {
                    black_box(1 + 1);
                }));
            }
            scheduler.tick();
        })
    });
}

fn benchmark_timers(c: &mut Criterion) {
    c.bench_function("set_timeout 1000", |b| {
        b.iter(|| {
            let scheduler = LocalScheduler::new();
            for i in 0..1000u32 {
                scheduler.set_timeout(
                    (i * 7) % 500,
                    Box::new(|| {
                        black_box(1 + 1);
                    }),
                );
            }
            scheduler.advance(500);
        })
    });
}

criterion_group!(benches, benchmark_microtasks, benchmark_timers);
criterion_main!(benches);
