use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use herald_events::{DeferredEvent, Event, ThreadExecutor, ThreadedEvent};
use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

fn bench_trigger(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigger");

    for handlers in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(handlers as u64));

        let event: Event<u64> = Event::new();
        let total = Rc::new(Cell::new(0u64));
        for _ in 0..handlers {
            let sink = Rc::clone(&total);
            event.on(move |value| sink.set(sink.get().wrapping_add(*value)));
        }
        group.bench_with_input(BenchmarkId::new("event", handlers), &event, |b, event| {
            b.iter(|| event.trigger(black_box(1)));
        });

        let threaded: ThreadedEvent<u64> = ThreadedEvent::with_executor(ThreadExecutor);
        let shared = Arc::new(AtomicU64::new(0));
        for _ in 0..handlers {
            let sink = Arc::clone(&shared);
            threaded.on(move |value| {
                sink.fetch_add(*value, Ordering::Relaxed);
            });
        }
        group.bench_with_input(BenchmarkId::new("threaded", handlers), &threaded, |b, event| {
            b.iter(|| event.trigger(black_box(1)));
        });
    }

    group.finish();
}

fn bench_once_rearm(c: &mut Criterion) {
    const HANDLERS: usize = 10;

    let mut group = c.benchmark_group("deferred_once_rearm");
    group.throughput(Throughput::Elements(HANDLERS as u64));

    let event: DeferredEvent<()> = DeferredEvent::new();
    let counters: Rc<[Cell<u64>]> = (0..HANDLERS).map(|_| Cell::new(0)).collect();
    let arm = |event: &DeferredEvent<()>| {
        for slot in 0..HANDLERS {
            let counters = Rc::clone(&counters);
            event.once(move |()| counters[slot].set(counters[slot].get() + 1));
        }
    };

    arm(&event);
    group.bench_function("trigger_drain_rearm", |b| {
        b.iter(|| {
            event.trigger(());
            black_box(event.run_all_deferred());
            arm(&event);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_trigger, bench_once_rearm);
criterion_main!(benches);
