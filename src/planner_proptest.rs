#![cfg(test)]

// Property tests for the batch planner kept inside the crate so they can
// inspect edits and operation flags directly.

use crate::error::UpdateError;
use crate::operation::{AspaUpdateOperation, OperationType};
use crate::planner::{self, Edit, Plan};
use crate::record::{AspaArray, AspaRecord};
use proptest::prelude::*;
use std::collections::BTreeSet;

// Small ASN range so batches collide with each other and the array often.
fn arb_existing() -> impl Strategy<Value = BTreeSet<u32>> {
    proptest::collection::btree_set(0u32..16, 0..10)
}

fn arb_batch() -> impl Strategy<Value = Vec<(bool, u32)>> {
    proptest::collection::vec((any::<bool>(), 0u32..16), 0..24)
}

fn array_of(asns: &BTreeSet<u32>) -> AspaArray {
    AspaArray::from_records(asns.iter().map(|&a| AspaRecord::new(a, [a + 100])))
        .unwrap_or_default()
}

fn ops_of(batch: &[(bool, u32)]) -> Vec<AspaUpdateOperation> {
    batch
        .iter()
        .enumerate()
        .map(|(i, &(add, asn))| {
            if add {
                AspaUpdateOperation::add(i, asn, [asn + 200])
            } else {
                AspaUpdateOperation::remove(i, asn)
            }
        })
        .collect()
}

fn perform(existing: &AspaArray, ops: &[AspaUpdateOperation], plan: &Plan) -> AspaArray {
    let mut out = existing.clone();
    let (mut inserted, mut removed) = (0usize, 0usize);
    for edit in &plan.edits {
        match *edit {
            Edit::Insert { op, at } => {
                out.insert_at(at + inserted - removed, ops[op].record().clone());
                inserted += 1;
            }
            Edit::Remove { at, .. } => {
                let _ = out.remove_at(at + inserted - removed);
                removed += 1;
            }
        }
    }
    out
}

fn asns(array: &AspaArray) -> Vec<u32> {
    array.iter().map(AspaRecord::customer_asn).collect()
}

// Property: sorting is by customer ASN and keeps arrival order among equals.
proptest! {
    #[test]
    fn prop_sort_is_stable(batch in arb_batch()) {
        let mut ops = ops_of(&batch);
        planner::sort_operations(&mut ops);
        for w in ops.windows(2) {
            prop_assert!(w[0].customer_asn() <= w[1].customer_asn());
            if w[0].customer_asn() == w[1].customer_asn() {
                prop_assert!(w[0].index() < w[1].index());
            }
        }
    }
}

// Property: edits and flags are consistent with the array and each other.
// - Edits follow sorted batch order and never target a skipped operation.
// - Performing the edits keeps the array sorted and unique.
// - On success the result equals existing ∪ surviving adds ∖ surviving
//   removes, and no-op pairs are adjacent add/remove halves on one customer.
// - On failure the failing operation genuinely conflicts with the array or
//   with the previous surviving operation on the same customer.
proptest! {
    #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]
    #[test]
    fn prop_plan_matches_model(existing in arb_existing(), batch in arb_batch()) {
        let array = array_of(&existing);
        let mut ops = ops_of(&batch);
        let plan = planner::plan(&mut ops, &array);

        let mut last_op = None;
        for edit in &plan.edits {
            let op = match *edit { Edit::Insert { op, .. } | Edit::Remove { op, .. } => op };
            prop_assert!(last_op.map_or(true, |l| l < op));
            prop_assert!(!ops[op].skip());
            last_op = Some(op);
        }

        let out = perform(&array, &ops, &plan);
        let got = asns(&out);
        prop_assert!(got.windows(2).all(|w| w[0] < w[1]));

        let end = plan.failure.as_ref().map_or(ops.len(), |f| f.op);
        let mut model = existing.clone();
        let mut survivor: Option<&AspaUpdateOperation> = None;
        let mut i = 0;
        while i < end {
            let op = &ops[i];
            if op.is_no_op() {
                let pair = &ops[i + 1];
                prop_assert!(pair.is_no_op() && pair.skip() && op.skip());
                prop_assert_eq!(pair.customer_asn(), op.customer_asn());
                prop_assert_ne!(pair.kind(), op.kind());
                prop_assert_eq!(pair.record().providers(), op.record().providers());
                i += 2;
                continue;
            }
            match op.kind() {
                OperationType::Add => prop_assert!(model.insert(op.customer_asn())),
                OperationType::Remove => prop_assert!(model.remove(&op.customer_asn())),
            }
            survivor = Some(op);
            i += 1;
        }
        prop_assert_eq!(got, model.iter().copied().collect::<Vec<_>>());

        if let Some(f) = &plan.failure {
            let op = &ops[f.op];
            let same_as_prev = survivor.is_some_and(|p| p.customer_asn() == op.customer_asn());
            match &f.error {
                UpdateError::DuplicateRecord { index, customer_asn } => {
                    prop_assert_eq!(op.kind(), OperationType::Add);
                    prop_assert!(same_as_prev || existing.contains(customer_asn));
                    prop_assert_eq!(*index, op.index());
                }
                UpdateError::RecordNotFound { index, customer_asn } => {
                    prop_assert_eq!(op.kind(), OperationType::Remove);
                    prop_assert!(same_as_prev || !existing.contains(customer_asn));
                    prop_assert_eq!(*index, op.index());
                }
                other => prop_assert!(false, "unexpected planner error {:?}", other),
            }
        }
    }
}

// Property: a batch with one operation per customer that only adds absent
// and removes present customers always succeeds.
proptest! {
    #[test]
    fn prop_consistent_batch_succeeds(existing in arb_existing(), picks in proptest::collection::btree_set(0u32..16, 0..16)) {
        let array = array_of(&existing);
        let batch: Vec<(bool, u32)> = picks.iter().rev().map(|&a| (!existing.contains(&a), a)).collect();
        let mut ops = ops_of(&batch);
        let plan = planner::plan(&mut ops, &array);
        prop_assert!(plan.result().is_ok());
        prop_assert_eq!(plan.edits.len(), picks.len());

        let expected: Vec<u32> = existing.symmetric_difference(&picks).copied().collect();
        prop_assert_eq!(asns(&perform(&array, &ops, &plan)), expected);
    }
}
