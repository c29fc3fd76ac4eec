//! The reference scenarios run by the playground commands.

use anyhow::{Context, Result, anyhow, ensure};
use herald_events::{DeferredEvent, Event, ThreadedEvent, WorkerPool};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Value the producer thread of [`wait`] triggers with.
const SIGNAL: u64 = 42;

/// A window-like component exposing its notifications as event fields.
#[derive(Debug, Default)]
pub(crate) struct Widget {
    pub(crate) resized: Event<(u32, u32)>,
    pub(crate) closed: Event<()>,
    /// Repaints are coalesced until the owner drains them.
    pub(crate) repainted: DeferredEvent<(u32, u32)>,
    size: Cell<(u32, u32)>,
}

impl Widget {
    pub(crate) fn resize(&self, width: u32, height: u32) {
        self.size.set((width, height));
        self.resized.trigger((width, height));
        self.repainted.trigger((width, height));
    }

    pub(crate) fn close(&self) {
        self.closed.trigger(());
    }
}

/// Wires a [`Widget`] up, drives it and returns what its handlers observed.
pub(crate) fn demo() -> Vec<String> {
    let widget = Widget::default();
    let transcript = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&transcript);
    widget.resized.on(move |(w, h)| sink.borrow_mut().push(format!("resized {w}x{h}")));
    let sink = Rc::clone(&transcript);
    widget.resized.once(move |(w, h)| sink.borrow_mut().push(format!("first layout {w}x{h}")));
    let sink = Rc::clone(&transcript);
    widget.closed.once(move |()| sink.borrow_mut().push("closed".to_owned()));
    let sink = Rc::clone(&transcript);
    widget.repainted.on(move |(w, h)| sink.borrow_mut().push(format!("repaint {w}x{h}")));

    widget.resize(640, 480);
    widget.resize(800, 600);
    widget.close();
    widget.close();
    let repaints = widget.repainted.run_all_deferred();

    let transcript = transcript.take();
    for line in &transcript {
        info!(%line, "Widget");
    }
    info!(repaints, size = ?widget.size.get(), "Demo finished");
    transcript
}

/// Triggers a deferred event `iterations` times with `handlers` once-handlers
/// re-armed after every drain, then checks each handler fired every round.
/// Returns the time spent in the loop.
///
/// # Errors
/// Fails if any handler missed or repeated a round.
pub(crate) fn bench(iterations: u64, handlers: usize) -> Result<Duration> {
    let event: DeferredEvent<()> = DeferredEvent::new();
    let counters: Rc<[Cell<u64>]> = (0..handlers).map(|_| Cell::new(0)).collect();
    let arm = || {
        for slot in 0..handlers {
            let counters = Rc::clone(&counters);
            event.once(move |()| counters[slot].set(counters[slot].get() + 1));
        }
    };

    let started = Instant::now();
    arm();
    for _ in 0..iterations {
        event.trigger(());
        event.run_all_deferred();
        arm();
    }
    event.run_all_deferred();
    let elapsed = started.elapsed();

    if let Some((slot, counter)) =
        counters.iter().enumerate().find(|(_, counter)| counter.get() != iterations)
    {
        return Err(anyhow!(
            "Handler {slot} fired {} times, expected {iterations}",
            counter.get()
        ));
    }

    info!(iterations, handlers, elapsed_ms = elapsed.as_millis(), "Benchmark finished");
    Ok(elapsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Delivered(u64),
    TimedOut,
}

/// Waits on the calling thread while another thread triggers after `delay`.
///
/// An asynchronous observer on `pool` and a [`OnceFuture`](herald_events::OnceFuture)
/// also watch the event; the future must see the trigger whatever the wait
/// reports.
///
/// # Errors
/// Fails if the producer thread cannot be started or panics.
pub(crate) fn wait(
    pool: WorkerPool,
    delay: Duration,
    timeout: Option<Duration>,
) -> Result<WaitOutcome> {
    let ready: ThreadedEvent<u64> = ThreadedEvent::with_executor(pool);
    ready.async_on(|value| info!(value, "Observed on the worker pool"));
    let echo = ready.future_once();

    let producer = ready.clone();
    let worker = thread::Builder::new()
        .name("herald-producer".to_owned())
        .spawn(move || {
            thread::sleep(delay);
            producer.trigger(SIGNAL);
        })
        .context("Failed to start the producer thread")?;

    let started = Instant::now();
    let received = ready.next(timeout);
    let waited = started.elapsed();
    worker.join().map_err(|_| anyhow!("Producer thread panicked"))?;

    let echoed = echo.get()?;
    ensure!(echoed == SIGNAL, "Future resolved with {echoed}, expected {SIGNAL}");

    let outcome = received.map_or(WaitOutcome::TimedOut, WaitOutcome::Delivered);
    match outcome {
        WaitOutcome::Delivered(value) => {
            info!(value, waited_ms = waited.as_millis(), "Wait delivered");
        },
        WaitOutcome::TimedOut => {
            warn!(?timeout, waited_ms = waited.as_millis(), "Wait timed out");
        },
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_runtime::{RuntimeConfig, build_runtime};

    #[test]
    fn test_demo_transcript() {
        assert_eq!(
            demo(),
            [
                "resized 640x480",
                "first layout 640x480",
                "resized 800x600",
                "closed",
                "repaint 640x480",
                "repaint 800x600",
            ]
        );
    }

    #[test]
    fn test_bench_counts_every_round() {
        assert!(bench(250, 4).is_ok());
        assert!(bench(0, 1).is_ok());
    }

    #[test]
    fn test_wait_delivers_before_timeout() {
        let runtime = build_runtime(&RuntimeConfig::default().with_worker_threads(1)).unwrap();
        let outcome = wait(
            WorkerPool::from_runtime(&runtime),
            Duration::from_millis(10),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Delivered(SIGNAL));
    }

    #[test]
    fn test_wait_times_out_before_late_trigger() {
        let runtime = build_runtime(&RuntimeConfig::default().with_worker_threads(1)).unwrap();
        let outcome = wait(
            WorkerPool::from_runtime(&runtime),
            Duration::from_millis(100),
            Some(Duration::from_millis(20)),
        )
        .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }
}
