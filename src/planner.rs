//! Batch planner: orders an update batch, resolves the special cases and
//! merges it against the existing array into a list of edits.
//!
//! Operations are stably sorted by customer ASN so operations on the same
//! customer become neighbours in arrival order. A single walk over the sorted
//! batch and the existing array (both ascending) then classifies each
//! operation:
//!
//! 1. add of a customer already in the array: `DuplicateRecord`
//! 2. second add of a customer within the batch: `DuplicateRecord`
//! 3. remove of a customer absent from the array: `RecordNotFound`
//! 4. second remove of a customer within the batch: `RecordNotFound`
//! 5. adjacent add and remove of one customer, in either order: a no-op pair,
//!    both halves marked `is_no_op` and `skip`
//!
//! The walk stops at the first failure in sorted order. Edits produced before
//! it are kept so the in-place executor can perform (and later undo) exactly
//! the mutations that precede the failing operation.

use crate::error::UpdateError;
use crate::operation::{AspaUpdateOperation, OperationType};
use crate::record::AspaArray;

/// A single array change. `op` is the position in the sorted batch, `at` the
/// position in the existing array before any edit of this plan.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Edit {
    Insert { op: usize, at: usize },
    Remove { op: usize, at: usize },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct PlanFailure {
    /// Position in the sorted batch.
    pub op: usize,
    pub error: UpdateError,
}

#[derive(Debug, Default)]
pub(crate) struct Plan {
    pub edits: Vec<Edit>,
    pub failure: Option<PlanFailure>,
}

impl Plan {
    pub fn result(&self) -> Result<(), UpdateError> {
        match &self.failure {
            None => Ok(()),
            Some(f) => Err(f.error.clone()),
        }
    }
}

/// Stable sort by customer ASN.
pub(crate) fn sort_operations(ops: &mut [AspaUpdateOperation]) {
    ops.sort_by_key(AspaUpdateOperation::customer_asn);
}

pub(crate) fn plan(ops: &mut [AspaUpdateOperation], existing: &AspaArray) -> Plan {
    sort_operations(ops);

    let records = existing.as_slice();
    let mut edits = Vec::with_capacity(ops.len());
    let mut cursor = 0;
    // Last operation that survived planning, i.e. not part of a no-op pair.
    let mut prev: Option<usize> = None;
    let mut i = 0;

    while i < ops.len() {
        let asn = ops[i].customer_asn();
        let kind = ops[i].kind();

        // Surviving neighbours on one customer always share a kind; differing
        // kinds pair up below before either can survive.
        if prev.is_some_and(|p| ops[p].customer_asn() == asn) {
            let index = ops[i].index();
            let error = match kind {
                OperationType::Add => UpdateError::DuplicateRecord { index, customer_asn: asn },
                OperationType::Remove => UpdateError::RecordNotFound { index, customer_asn: asn },
            };
            return Plan {
                edits,
                failure: Some(PlanFailure { op: i, error }),
            };
        }

        if ops
            .get(i + 1)
            .is_some_and(|next| next.customer_asn() == asn && next.kind() != kind)
        {
            mark_no_op_pair(ops, i);
            tracing::trace!(customer_asn = asn, "complementary add/remove pair");
            i += 2;
            continue;
        }

        while cursor < records.len() && records[cursor].customer_asn() < asn {
            cursor += 1;
        }
        let matched = records.get(cursor).filter(|r| r.customer_asn() == asn);

        match (kind, matched) {
            (OperationType::Add, None) => edits.push(Edit::Insert { op: i, at: cursor }),
            (OperationType::Remove, Some(existing)) => {
                ops[i].set_record(existing.clone());
                edits.push(Edit::Remove { op: i, at: cursor });
                cursor += 1;
            }
            (OperationType::Add, Some(_)) => {
                let error = UpdateError::DuplicateRecord {
                    index: ops[i].index(),
                    customer_asn: asn,
                };
                return Plan {
                    edits,
                    failure: Some(PlanFailure { op: i, error }),
                };
            }
            (OperationType::Remove, None) => {
                let error = UpdateError::RecordNotFound {
                    index: ops[i].index(),
                    customer_asn: asn,
                };
                return Plan {
                    edits,
                    failure: Some(PlanFailure { op: i, error }),
                };
            }
        }

        prev = Some(i);
        i += 1;
    }

    Plan {
        edits,
        failure: None,
    }
}

/// Marks `ops[i]` and `ops[i + 1]` as a no-op pair. The remove half takes the
/// add's provider set so both can be reported with the same record.
fn mark_no_op_pair(ops: &mut [AspaUpdateOperation], i: usize) {
    let add = if ops[i].kind() == OperationType::Add { i } else { i + 1 };
    let remove = if add == i { i + 1 } else { i };
    let providers = ops[add].record().provider_set().clone();
    let record = ops[remove].record().with_providers(providers);
    ops[remove].set_record(record);

    for op in &mut ops[i..=i + 1] {
        op.is_no_op = true;
        op.skip = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AspaRecord;

    fn array(asns: &[u32]) -> AspaArray {
        AspaArray::from_records(asns.iter().map(|&a| AspaRecord::new(a, [a * 10]))).unwrap()
    }

    /// Invariant: operations on one customer keep their arrival order.
    #[test]
    fn sort_is_stable() {
        let mut ops = vec![
            AspaUpdateOperation::add(0, 40, [1]),
            AspaUpdateOperation::add(1, 10, [1]),
            AspaUpdateOperation::remove(2, 40),
            AspaUpdateOperation::remove(3, 10),
        ];
        sort_operations(&mut ops);
        let order: Vec<usize> = ops.iter().map(AspaUpdateOperation::index).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn merge_produces_positions_in_existing_array() {
        let existing = array(&[10, 30]);
        let mut ops = vec![
            AspaUpdateOperation::add(0, 40, [1]),
            AspaUpdateOperation::remove(1, 30),
            AspaUpdateOperation::add(2, 20, [1]),
            AspaUpdateOperation::add(3, 5, [1]),
        ];
        let plan = plan(&mut ops, &existing);
        assert!(plan.failure.is_none());
        assert_eq!(
            plan.edits,
            vec![
                Edit::Insert { op: 0, at: 0 },
                Edit::Insert { op: 1, at: 1 },
                Edit::Remove { op: 2, at: 1 },
                Edit::Insert { op: 3, at: 2 },
            ]
        );
        // The remove now carries the provider set it took away.
        assert_eq!(ops[2].record().providers(), &[300]);
    }

    /// Invariant: case 2, the second add of one customer is rejected.
    #[test]
    fn duplicate_add_in_batch() {
        let mut ops = vec![
            AspaUpdateOperation::add(0, 30, [1]),
            AspaUpdateOperation::add(1, 30, [2]),
        ];
        let plan = plan(&mut ops, &AspaArray::new());
        let f = plan.failure.unwrap();
        assert_eq!(f.error, UpdateError::DuplicateRecord { index: 1, customer_asn: 30 });
        assert_eq!(f.op, 1);
        assert_eq!(plan.edits, vec![Edit::Insert { op: 0, at: 0 }]);
    }

    /// Invariant: case 4, the second remove of one customer is rejected.
    #[test]
    fn duplicate_remove_in_batch() {
        let mut ops = vec![AspaUpdateOperation::remove(0, 10), AspaUpdateOperation::remove(1, 10)];
        let plan = plan(&mut ops, &array(&[10]));
        assert_eq!(
            plan.failure.unwrap().error,
            UpdateError::RecordNotFound { index: 1, customer_asn: 10 }
        );
    }

    /// Invariant: case 1, adding an existing customer is rejected.
    #[test]
    fn add_existing() {
        let mut ops = vec![AspaUpdateOperation::add(0, 10, [1])];
        let plan = plan(&mut ops, &array(&[10]));
        assert_eq!(
            plan.failure.unwrap().error,
            UpdateError::DuplicateRecord { index: 0, customer_asn: 10 }
        );
        assert!(plan.edits.is_empty());
    }

    /// Invariant: case 3, removing an unknown customer is rejected.
    #[test]
    fn remove_unknown() {
        let mut ops = vec![AspaUpdateOperation::remove(0, 50)];
        let plan = plan(&mut ops, &array(&[10]));
        assert_eq!(
            plan.failure.unwrap().error,
            UpdateError::RecordNotFound { index: 0, customer_asn: 50 }
        );
    }

    /// Invariant: case 5, an add/remove pair cancels in either order and the
    /// remove half reports the add's providers.
    #[test]
    fn complementary_pair_either_order() {
        for ops in [
            vec![AspaUpdateOperation::add(0, 40, [7]), AspaUpdateOperation::remove(1, 40)],
            vec![AspaUpdateOperation::remove(0, 40), AspaUpdateOperation::add(1, 40, [7])],
        ] {
            let mut ops = ops;
            let plan = plan(&mut ops, &array(&[10]));
            assert!(plan.failure.is_none());
            assert!(plan.edits.is_empty());
            assert!(ops.iter().all(|op| op.is_no_op() && op.skip()));
            assert!(ops.iter().all(|op| op.record().providers() == [7]));
        }
    }

    /// Invariant: the first failure in sorted order wins.
    #[test]
    fn first_failure_in_sorted_order() {
        let mut ops = vec![
            AspaUpdateOperation::add(0, 90, [1]),
            AspaUpdateOperation::add(1, 90, [1]),
            AspaUpdateOperation::remove(2, 20),
        ];
        let plan = plan(&mut ops, &array(&[10]));
        assert_eq!(
            plan.failure.unwrap().error,
            UpdateError::RecordNotFound { index: 2, customer_asn: 20 }
        );
    }

    #[test]
    fn duplicate_check_precedes_pairing() {
        let mut ops = vec![
            AspaUpdateOperation::add(0, 30, [1]),
            AspaUpdateOperation::add(1, 30, [1]),
            AspaUpdateOperation::remove(2, 30),
        ];
        let plan = plan(&mut ops, &AspaArray::new());
        assert_eq!(
            plan.failure.unwrap().error,
            UpdateError::DuplicateRecord { index: 1, customer_asn: 30 }
        );
    }

    #[test]
    fn empty_batch_is_empty_plan() {
        let mut ops: Vec<AspaUpdateOperation> = Vec::new();
        let plan = plan(&mut ops, &array(&[10, 20]));
        assert!(plan.edits.is_empty());
        assert_eq!(plan.result(), Ok(()));
    }
}
