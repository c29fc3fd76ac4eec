use herald_events::Event;
use proptest::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy)]
enum Op {
    On,
    Once,
    Trigger,
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::On),
        Just(Op::Once),
        Just(Op::Trigger),
        (0usize..32).prop_map(Op::Remove),
    ]
}

/// Reference model of a single registration.
struct Model {
    once: bool,
    live: bool,
    expected: usize,
    hits: Rc<Cell<usize>>,
}

proptest! {
    #[test]
    fn handlers_fire_per_their_registration_kind(
        kinds in proptest::collection::vec(any::<bool>(), 0..24),
        triggers in 1usize..6,
    ) {
        let event: Event<usize> = Event::new();
        let counters: Vec<_> = kinds
            .iter()
            .map(|&once| {
                let hits = Rc::new(Cell::new(0usize));
                let sink = Rc::clone(&hits);
                let handler = move |_: &usize| sink.set(sink.get() + 1);
                if once { event.once(handler) } else { event.on(handler) };
                (once, hits)
            })
            .collect();

        for round in 0..triggers {
            event.trigger(round);
        }

        for (once, hits) in &counters {
            let expected = if *once { 1 } else { triggers };
            prop_assert_eq!(hits.get(), expected);
        }
        let persistent = kinds.iter().filter(|once| !**once).count();
        prop_assert_eq!(event.count_handlers(), persistent);
    }

    #[test]
    fn interleaved_operations_match_model(ops in proptest::collection::vec(op(), 0..64)) {
        let event: Event<()> = Event::new();
        let mut handles = Vec::new();
        let mut models: Vec<Model> = Vec::new();

        for op in ops {
            match op {
                Op::On | Op::Once => {
                    let once = matches!(op, Op::Once);
                    let hits = Rc::new(Cell::new(0usize));
                    let sink = Rc::clone(&hits);
                    let handler = move |(): &()| sink.set(sink.get() + 1);
                    handles.push(if once { event.once(handler) } else { event.on(handler) });
                    models.push(Model { once, live: true, expected: 0, hits });
                },
                Op::Trigger => {
                    event.trigger(());
                    for model in models.iter_mut().filter(|model| model.live) {
                        model.expected += 1;
                        if model.once {
                            model.live = false;
                        }
                    }
                },
                Op::Remove(pick) => {
                    if handles.is_empty() {
                        continue;
                    }
                    let index = pick % handles.len();
                    let removed = event.remove(handles[index]);
                    prop_assert_eq!(removed, models[index].live);
                    models[index].live = false;
                },
            }

            let live = models.iter().filter(|model| model.live).count();
            prop_assert_eq!(event.count_handlers(), live);
            prop_assert_eq!(event.has_handlers(), live > 0);
        }

        for model in &models {
            prop_assert_eq!(model.hits.get(), model.expected);
        }
    }
}
