//! Ordering laws for the priority queues

use notebook_refresh::queue::{BuildQueue, PriorityQueue};
use notebook_refresh::types::TriggerType;
use proptest::prelude::*;
use std::collections::HashSet;

fn trigger_strategy() -> impl Strategy<Value = TriggerType> {
    prop_oneof![
        Just(TriggerType::ManualRefresh),
        Just(TriggerType::PageLoad),
        Just(TriggerType::AutoRefresh),
    ]
}

/// Items always come out sorted by `(priority, sequence)`
#[test]
fn test_pop_order_is_priority_then_sequence() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(0u8..4, 0..64), |priorities| {
            let mut queue = PriorityQueue::new();
            for (index, priority) in priorities.iter().enumerate() {
                queue.push(*priority, index);
            }

            let mut popped = Vec::new();
            while let Some((priority, sequence, index)) = queue.pop() {
                prop_assert_eq!(priority, priorities[index]);
                popped.push((priority, sequence));
            }

            prop_assert_eq!(popped.len(), priorities.len());
            prop_assert!(popped.windows(2).all(|pair| pair[0] < pair[1]));
            Ok(())
        })
        .unwrap();
}

/// Interactive builds drain before any auto-refresh build, and each actor is
/// waiting at most once
#[test]
fn test_build_queue_interactive_first_and_deduplicated() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &prop::collection::vec((0usize..8, trigger_strategy()), 1..40),
            |submissions| {
                let queue = BuildQueue::new();
                let mut accepted = HashSet::new();
                for (index, (actor, trigger)) in submissions.iter().enumerate() {
                    let actor_id = format!("actor-{actor}");
                    let job_id = format!("job-{index}");
                    let fresh = accepted.insert(actor_id.clone());
                    let pushed =
                        queue.enqueue_build(&actor_id, *trigger, &job_id, trigger.priority());
                    prop_assert_eq!(pushed, fresh);
                }
                prop_assert_eq!(queue.depth(), accepted.len());

                let mut seen_auto = false;
                let mut drained = HashSet::new();
                while let Some(entry) = queue.try_pop() {
                    let is_auto = entry.trigger == TriggerType::AutoRefresh;
                    prop_assert!(!(seen_auto && !is_auto));
                    seen_auto |= is_auto;
                    prop_assert!(drained.insert(entry.actor_id));
                }
                prop_assert_eq!(drained, accepted);
                Ok(())
            },
        )
        .unwrap();
}
