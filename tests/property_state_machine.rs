//! Property tests for the bead state machine and its laws.

use proptest::prelude::*;
use uuid::Uuid;

use gastown::domain::models::{Bead, BeadResult, BeadStatus, VerificationVerdict};
use gastown::services::ConvoyStore;

/// Operations a scheduler could throw at a single bead, in any order.
#[derive(Debug, Clone)]
enum Op {
    Enqueue,
    Assign,
    Unassign,
    Start,
    CompletePass,
    CompleteFail,
    Requeue,
    Promote,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Enqueue),
        Just(Op::Assign),
        Just(Op::Unassign),
        Just(Op::Start),
        Just(Op::CompletePass),
        Just(Op::CompleteFail),
        Just(Op::Requeue),
        Just(Op::Promote),
    ]
}

fn apply(store: &ConvoyStore, bead_id: Uuid, worker: Uuid, op: &Op) -> Result<(), ()> {
    let result: Result<(), gastown::DomainError> = match op {
        Op::Enqueue => store.enqueue_bead(bead_id),
        Op::Assign => store.assign_bead(bead_id, worker),
        Op::Unassign => store.unassign_bead(bead_id),
        Op::Start => store.start_bead(bead_id),
        Op::CompletePass => store
            .complete_bead(bead_id, BeadResult::default(), VerificationVerdict::passing())
            .map(|_| ()),
        Op::CompleteFail => store
            .complete_bead(
                bead_id,
                BeadResult::default(),
                VerificationVerdict::failing(vec!["bad".into()]),
            )
            .map(|_| ()),
        Op::Requeue => store.requeue_bead(bead_id, "forced").map(|_| ()),
        Op::Promote => {
            store.promote_requeued();
            Ok(())
        }
    };
    result.map_err(|_| ())
}

proptest! {
    /// Property: no operation sequence can corrupt a bead.
    ///
    /// Rejected operations leave the status untouched, terminal states
    /// absorb everything, and the attempt counter never exceeds the
    /// retry budget.
    #[test]
    fn prop_random_op_sequences_preserve_invariants(
        ops in proptest::collection::vec(op_strategy(), 1..40),
        max_attempts in 1u32..5,
    ) {
        let store = ConvoyStore::new();
        let worker = Uuid::new_v4();
        let bead_id = store.add_bead(Bead::new("b", "backend").with_max_attempts(max_attempts));

        for op in &ops {
            let before = store.get_bead(bead_id).unwrap();
            let outcome = apply(&store, bead_id, worker, op);
            let after = store.get_bead(bead_id).unwrap();

            if outcome.is_err() {
                prop_assert_eq!(before.status, after.status,
                    "rejected op {:?} changed status", op);
                prop_assert_eq!(before.attempt, after.attempt);
            }
            if before.status.is_terminal() {
                prop_assert_eq!(before.status, after.status,
                    "terminal status escaped via {:?}", op);
            }
            prop_assert!(after.attempt <= after.max_attempts);
        }
    }

    /// Property: a bead that fails verification on every attempt ends
    /// terminally failed with its attempt counter exactly equal to the
    /// retry budget.
    #[test]
    fn prop_attempt_budget_law(max_attempts in 1u32..6) {
        let store = ConvoyStore::new();
        let worker = Uuid::new_v4();
        let bead_id = store.add_bead(Bead::new("b", "backend").with_max_attempts(max_attempts));

        let mut failures = 0u32;
        loop {
            store.promote_requeued();
            store.assign_bead(bead_id, worker).unwrap();
            store.start_bead(bead_id).unwrap();
            let status = store
                .complete_bead(
                    bead_id,
                    BeadResult::default(),
                    VerificationVerdict::failing(vec!["no".into()]),
                )
                .unwrap();
            failures += 1;
            if status == BeadStatus::Failed {
                break;
            }
            prop_assert_eq!(status, BeadStatus::Requeued);
        }

        let bead = store.get_bead(bead_id).unwrap();
        prop_assert_eq!(failures, max_attempts);
        prop_assert_eq!(bead.attempt, max_attempts);
        prop_assert_eq!(bead.status, BeadStatus::Failed);
    }

    /// Property: a bead with an incomplete dependency never shows up in
    /// the ready queue, whatever else happens around it.
    #[test]
    fn prop_blocked_beads_never_ready(
        ops in proptest::collection::vec(op_strategy(), 1..20),
    ) {
        let store = ConvoyStore::new();
        let worker = Uuid::new_v4();
        let dep_id = store.add_bead(Bead::new("dep", "backend"));
        let blocked = Bead::new("blocked", "backend").with_dependencies(vec![dep_id]);
        let blocked_id = store.add_bead(blocked);
        store.enqueue_bead(blocked_id).unwrap();

        for op in &ops {
            // Churn the dependency through arbitrary operations but
            // never complete it.
            if matches!(op, Op::CompletePass) {
                continue;
            }
            let _ = apply(&store, dep_id, worker, op);
            let ready: Vec<Uuid> = store.get_ready_beads().iter().map(|b| b.id).collect();
            prop_assert!(!ready.contains(&blocked_id));
        }
    }
}
