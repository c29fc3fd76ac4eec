pub mod fixtures;

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use herald_events::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn summing(total: &Rc<Cell<i32>>) -> impl FnMut(&Sample) + 'static {
        let total = Rc::clone(total);
        move |(a, b, _)| total.set(total.get() + a + b)
    }

    #[test]
    fn test_deferred_on_once_and_remove_all() {
        let event: DeferredEvent<Sample> = DeferredEvent::new();
        let persistent = Rc::new(Cell::new(0));
        let once = Rc::new(Cell::new(0));
        event.on(summing(&persistent));
        event.once(summing(&once));

        event.trigger(sample(1, 5, "A"));
        event.trigger(sample(3, 7, "B"));
        assert_eq!(persistent.get(), 0, "nothing runs before the queue is drained");
        assert_eq!(once.get(), 0);
        assert_eq!(event.pending(), 2);

        assert!(event.run_deferred(), "one occurrence should remain");
        assert_eq!(persistent.get(), 6);
        assert_eq!(once.get(), 6);

        assert!(!event.run_deferred());
        assert_eq!(persistent.get(), 16);
        assert_eq!(once.get(), 6);

        event.trigger(sample(1, 1, "C"));
        assert_eq!(event.remove_all(), 1);
        assert_eq!(event.run_all_deferred(), 1);
        assert_eq!(persistent.get(), 16, "removed handlers must not see drained occurrences");
    }

    #[test]
    fn test_run_deferred_on_empty_queue() {
        let event: DeferredEvent<Sample> = DeferredEvent::default();
        assert!(!event.run_deferred());
        assert_eq!(event.run_all_deferred(), 0);
        assert_eq!(event.pending(), 0);
    }

    #[test]
    fn test_occurrences_drain_in_trigger_order() {
        let event: DeferredEvent<i32> = DeferredEvent::new();
        let seen = log();
        let sink = Rc::clone(&seen);
        event.on(move |value| sink.borrow_mut().push(*value));

        for value in 1..=5 {
            event.trigger(value);
        }
        assert_eq!(event.run_all_deferred(), 5);
        assert_eq!(*seen.borrow(), [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_handlers_registered_after_trigger_see_the_occurrence() {
        let event: DeferredEvent<Sample> = DeferredEvent::new();
        let sum = Rc::new(Cell::new(0));

        event.trigger(sample(2, 3, "late"));
        event.on(summing(&sum));
        event.run_all_deferred();
        assert_eq!(sum.get(), 5);
    }

    #[test]
    fn test_shared_queue_preserves_global_order() {
        let queue = DeferredQueue::new();
        let resized: DeferredEvent<(u32, u32)> = DeferredEvent::with_queue(queue.clone());
        let closed: DeferredEvent<()> = DeferredEvent::with_queue(queue.clone());
        let seen = log();

        let sink = Rc::clone(&seen);
        resized.on(move |(w, h)| sink.borrow_mut().push(format!("resized {w}x{h}")));
        let sink = Rc::clone(&seen);
        closed.on(move |()| sink.borrow_mut().push("closed".to_owned()));

        resized.trigger((1, 1));
        closed.trigger(());
        resized.trigger((2, 2));
        assert_eq!(queue.len(), 3);
        assert_eq!(closed.pending(), 3);

        assert!(closed.run_deferred());
        assert_eq!(*seen.borrow(), ["resized 1x1"]);

        assert_eq!(queue.run_all(), 2);
        assert_eq!(*seen.borrow(), ["resized 1x1", "closed", "resized 2x2"]);
    }

    #[test]
    fn test_clear_deferred_discards_without_running() {
        let event: DeferredEvent<Sample> = DeferredEvent::new();
        let sum = Rc::new(Cell::new(0));
        event.on(summing(&sum));

        event.trigger(sample(1, 1, "A"));
        event.trigger(sample(2, 2, "B"));
        assert_eq!(event.clear_deferred(), 2);
        assert!(!event.run_deferred());
        assert_eq!(sum.get(), 0);
        assert!(event.has_handlers());
    }

    #[test]
    fn test_pending_actions_outlive_dropped_event_as_noops() {
        let queue = DeferredQueue::new();
        let sum = Rc::new(Cell::new(0));
        {
            let event: DeferredEvent<Sample> = DeferredEvent::with_queue(queue.clone());
            event.on(summing(&sum));
            event.trigger(sample(4, 4, "orphan"));
        }

        assert_eq!(queue.len(), 1);
        assert!(!queue.run_one());
        assert_eq!(sum.get(), 0);
    }

    #[test]
    fn test_action_queued_while_draining_runs_in_same_drain() {
        let queue = DeferredQueue::new();
        let seen = log();

        let inner = queue.clone();
        let sink = Rc::clone(&seen);
        queue.push(move || {
            sink.borrow_mut().push("first");
            let sink = Rc::clone(&sink);
            inner.push(move || sink.borrow_mut().push("second"));
        });

        assert_eq!(queue.run_all(), 2);
        assert_eq!(*seen.borrow(), ["first", "second"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_is_scoped_to_the_event() {
        let first: DeferredEvent<Sample> = DeferredEvent::new();
        let second: DeferredEvent<Sample> = DeferredEvent::new();
        let sum = Rc::new(Cell::new(0));

        let handle = first.once(summing(&sum));
        assert!(!second.remove(handle));
        assert_eq!(first.count_handlers(), 1);
        assert!(first.remove(handle));
        assert!(!first.has_handlers());
    }
}
