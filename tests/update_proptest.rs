// Model-based properties over random batches, run through both mechanisms.
//
// Model: BTreeMap customer -> providers, maintained only from listener
// notifications.
// Invariants:
// - SwapIn and InPlace tables agree on every batch result, array and
//   notification sequence, with and without no-op reporting.
// - A rejected batch leaves the table unchanged and produces no
//   notification.
// - Without no-op reporting an accepted batch's notifications are an exact
//   diff: replaying them on the model reproduces the published array, Added
//   never names a present customer and Removed always names a present one
//   with its providers.
// - With no-op reporting each customer's Added minus Removed count equals
//   its change in membership.
// - Published arrays stay strictly sorted by customer.
use aspa_table::{
    AspaRecord, AspaTable, AspaUpdateOperation, ChangeKind, InPlace, Mechanism, SwapIn,
    TableConfig, UpdateStrategy,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<(AspaRecord, ChangeKind)>>>;

fn contents(array: Option<Arc<aspa_table::AspaArray>>) -> BTreeMap<u32, Vec<u32>> {
    array
        .map(|a| {
            a.iter()
                .map(|r| (r.customer_asn(), r.providers().to_vec()))
                .collect()
        })
        .unwrap_or_default()
}

fn recorder<M: Mechanism>(t: &mut AspaTable<u8, M>) -> Log {
    let log: Log = Arc::default();
    let sink = log.clone();
    t.register_listener(move |_: &u8, r: &AspaRecord, k: ChangeKind| {
        sink.lock().unwrap().push((r.clone(), k));
    });
    log
}

fn drain(log: &Log) -> Vec<(AspaRecord, ChangeKind)> {
    log.lock().unwrap().drain(..).collect()
}

fn flip(kind: ChangeKind) -> ChangeKind {
    match kind {
        ChangeKind::Added => ChangeKind::Removed,
        ChangeKind::Removed => ChangeKind::Added,
    }
}

fn arb_batches() -> impl Strategy<Value = Vec<Vec<(bool, u32, Vec<u32>)>>> {
    let op = (any::<bool>(), 0u32..12, proptest::collection::vec(0u32..6, 0..4));
    proptest::collection::vec(proptest::collection::vec(op, 0..10), 1..12)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_mechanisms_agree_with_notified_model(notify_no_ops in any::<bool>(), batches in arb_batches()) {
        let config = TableConfig::default().with_notify_no_ops(notify_no_ops);
        let mut swap: AspaTable<u8, SwapIn> = AspaTable::with_config(config);
        let mut in_place: AspaTable<u8, InPlace> = AspaTable::with_config(config);
        let swap_log = recorder(&mut swap);
        let in_place_log = recorder(&mut in_place);
        let mut model: BTreeMap<u32, Vec<u32>> = BTreeMap::new();

        for batch in batches {
            let ops: Vec<AspaUpdateOperation> = batch
                .iter()
                .enumerate()
                .map(|(i, (add, asn, providers))| {
                    if *add {
                        AspaUpdateOperation::add(i, *asn, providers.iter().copied())
                    } else {
                        AspaUpdateOperation::remove(i, *asn)
                    }
                })
                .collect();

            let before = contents(swap.array(&0));
            let a = swap.apply_batch(&0, ops.clone());
            let b = in_place.apply_batch(&0, ops);
            prop_assert_eq!(&a, &b);

            let after = contents(swap.array(&0));
            prop_assert_eq!(&after, &contents(in_place.array(&0)));

            let changes = drain(&swap_log);
            prop_assert_eq!(&changes, &drain(&in_place_log));
            match a {
                Err(e) => {
                    prop_assert!(e.failed_index().is_some_and(|i| i < batch.len()));
                    prop_assert_eq!(&after, &before);
                    prop_assert!(changes.is_empty());
                }
                Ok(report) if notify_no_ops => {
                    prop_assert_eq!(report.added + report.removed + report.no_ops, changes.len());
                    let mut net: BTreeMap<u32, i32> = BTreeMap::new();
                    for (record, kind) in &changes {
                        *net.entry(record.customer_asn()).or_default() += match kind {
                            ChangeKind::Added => 1,
                            ChangeKind::Removed => -1,
                        };
                    }
                    for (asn, delta) in net {
                        let expected = after.contains_key(&asn) as i32 - before.contains_key(&asn) as i32;
                        prop_assert_eq!(delta, expected, "customer {}", asn);
                    }
                    model = after.clone();
                }
                Ok(report) => {
                    prop_assert_eq!(report.added + report.removed, changes.len());
                    for (record, kind) in changes {
                        let providers = record.providers().to_vec();
                        match kind {
                            ChangeKind::Added => {
                                prop_assert!(model.insert(record.customer_asn(), providers).is_none());
                            }
                            ChangeKind::Removed => {
                                prop_assert_eq!(model.remove(&record.customer_asn()), Some(providers));
                            }
                        }
                    }
                    prop_assert_eq!(&after, &model);
                }
            }
            if let Some(array) = swap.array(&0) {
                let asns: Vec<u32> = array.iter().map(AspaRecord::customer_asn).collect();
                prop_assert!(asns.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}

fn arb_seeded_batch() -> impl Strategy<Value = (Vec<u32>, Vec<(bool, u32)>)> {
    (
        proptest::collection::btree_set(0u32..16, 0..10).prop_map(|s| s.into_iter().collect()),
        proptest::collection::vec((any::<bool>(), 0u32..16), 0..12),
    )
}

fn batch_ops(batch: &[(bool, u32)]) -> Vec<AspaUpdateOperation> {
    batch
        .iter()
        .enumerate()
        .map(|(i, &(add, asn))| {
            if add {
                AspaUpdateOperation::add(i, asn, [asn + 1])
            } else {
                AspaUpdateOperation::remove(i, asn)
            }
        })
        .collect()
}

fn seed_ops(asns: &[u32]) -> Vec<AspaUpdateOperation> {
    asns.iter()
        .enumerate()
        .map(|(i, &a)| AspaUpdateOperation::add(i, a, [a + 100]))
        .collect()
}

// Property: discarding a computed swap-in update and undoing an in-place
// update both leave the published array exactly as it was, whether or not
// the batch was accepted.
proptest! {
    #[test]
    fn prop_discard_and_undo_restore((existing, batch) in arb_seeded_batch()) {
        let mut swap: AspaTable<u8, SwapIn> = AspaTable::new();
        swap.apply_batch(&0, seed_ops(&existing)).unwrap();
        let before = swap.array(&0).unwrap();
        let u = swap.compute_update(&0, batch_ops(&batch));
        u.finish();
        let after = swap.array(&0).unwrap();
        prop_assert!(Arc::ptr_eq(&before, &after));

        let mut in_place: AspaTable<u8, InPlace> = AspaTable::new();
        in_place.apply_batch(&0, seed_ops(&existing)).unwrap();
        let mut u = in_place.update(&0, batch_ops(&batch));
        prop_assert!(in_place.undo_update(&mut u).is_ok());
        u.cleanup();
        prop_assert_eq!(contents(in_place.array(&0)), contents(Some(before)));
    }
}

// Property: undoing an accepted in-place update reports exactly the update's
// notifications flipped and newest first. Without no-op reporting, replaying
// both sequences on a model of the seeded array tracks the table at every
// step.
proptest! {
    #[test]
    fn prop_undo_notifications_mirror_update(
        notify_no_ops in any::<bool>(),
        (existing, batch) in arb_seeded_batch()
    ) {
        let config = TableConfig::default().with_notify_no_ops(notify_no_ops);
        let mut t: AspaTable<u8, InPlace> = AspaTable::with_config(config);
        t.apply_batch(&0, seed_ops(&existing)).unwrap();
        let seed = contents(t.array(&0));
        let log = recorder(&mut t);

        let mut u = t.update(&0, batch_ops(&batch));
        let accepted = u.result().is_ok();
        let updated = contents(t.array(&0));
        let forward = drain(&log);
        prop_assert!(t.undo_update(&mut u).is_ok());
        u.cleanup();
        let undone = drain(&log);

        prop_assert_eq!(contents(t.array(&0)), seed.clone());
        if !accepted {
            prop_assert!(forward.is_empty() && undone.is_empty());
            return Ok(());
        }
        let mirrored: Vec<_> = forward.iter().rev().map(|(r, k)| (r.clone(), flip(*k))).collect();
        prop_assert_eq!(&undone, &mirrored);

        if !notify_no_ops {
            let mut model = seed.clone();
            for (record, kind) in &forward {
                match kind {
                    ChangeKind::Added => {
                        prop_assert!(model.insert(record.customer_asn(), record.providers().to_vec()).is_none());
                    }
                    ChangeKind::Removed => {
                        prop_assert!(model.remove(&record.customer_asn()).is_some());
                    }
                }
            }
            prop_assert_eq!(&model, &updated);
            for (record, kind) in &undone {
                match kind {
                    ChangeKind::Added => {
                        prop_assert!(model.insert(record.customer_asn(), record.providers().to_vec()).is_none());
                    }
                    ChangeKind::Removed => {
                        prop_assert!(model.remove(&record.customer_asn()).is_some());
                    }
                }
            }
            prop_assert_eq!(&model, &seed);
        }
    }
}
