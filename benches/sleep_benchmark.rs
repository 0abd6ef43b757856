/*!
 * Sleep/Wakeup Benchmarks
 *
 * Wake latency, broadcast fan-out, and the no-waiter fast path
 */

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use parking_lot::Mutex;
use sleepq::ChannelWaitRegistry;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn bench_wake_latency(c: &mut Criterion) {
    c.bench_function("wake_one_latency", |b| {
        b.iter(|| {
            let registry = Arc::new(ChannelWaitRegistry::<u64>::with_defaults());
            let lock = Arc::new(Mutex::new(()));

            let r = registry.clone();
            let l = lock.clone();
            let handle = thread::spawn(move || {
                let mut guard = l.lock();
                r.sleep_on(1, &mut guard, Some(Duration::from_secs(1)))
            });

            while registry.waiter_count(1) == 0 {
                thread::yield_now();
            }
            registry.wake_one(1);
            handle.join().unwrap().ok();
        });
    });
}

fn bench_broadcast_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_fanout");

    for num_sleepers in [1usize, 4, 8, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_sleepers),
            &num_sleepers,
            |b, &num_sleepers| {
                b.iter(|| {
                    let registry = Arc::new(ChannelWaitRegistry::<u64>::with_defaults());
                    let lock = Arc::new(Mutex::new(()));

                    let handles: Vec<_> = (0..num_sleepers)
                        .map(|_| {
                            let registry = registry.clone();
                            let lock = lock.clone();
                            thread::spawn(move || {
                                let mut guard = lock.lock();
                                registry.sleep_on(100, &mut guard, Some(Duration::from_secs(1)))
                            })
                        })
                        .collect();

                    while registry.waiter_count(100) < num_sleepers {
                        thread::yield_now();
                    }
                    registry.wake_all(100);

                    for handle in handles {
                        handle.join().unwrap().ok();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_wake_no_waiters(c: &mut Criterion) {
    let registry = ChannelWaitRegistry::<u64>::with_defaults();

    c.bench_function("wake_all_no_waiters", |b| {
        b.iter(|| registry.wake_all(criterion::black_box(42)));
    });
}

criterion_group!(
    benches,
    bench_wake_latency,
    bench_broadcast_fanout,
    bench_wake_no_waiters
);
criterion_main!(benches);
