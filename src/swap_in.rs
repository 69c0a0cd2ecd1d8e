//! Swap-in updates: compute a new array, optionally apply it, always finish.
//!
//! `compute_update` reads the published array but never changes it, so it
//! runs alongside any number of lookups. `apply_update` replaces the
//! published array with a single reference swap and notifies listeners.
//! `finish` releases whatever the update still holds: the retired array
//! after an apply, or the unpublished one otherwise. Finishing without
//! applying leaves the table as it was before the compute.

use crate::error::UpdateError;
use crate::operation::AspaUpdateOperation;
use crate::planner::{self, Edit};
use crate::record::AspaArray;
use crate::store::NodeHandle;
use crate::strategy::SwapIn;
use crate::table::AspaTable;
use core::fmt::Debug;
use core::hash::Hash;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateState {
    /// Computed successfully; may be applied.
    Computed,
    /// Computation rejected the batch; can only be finished.
    Failed,
    Applied,
}

/// A computed swap-in update. Must be passed to [`finish`](Self::finish).
#[must_use = "a computed update must be finished"]
#[derive(Debug)]
pub struct AspaUpdate<C> {
    connection: C,
    operations: Vec<AspaUpdateOperation>,
    node: Option<NodeHandle>,
    // Node version the update was computed against.
    base_version: Option<u64>,
    // The array computed against; once applied, the retired array.
    base: Option<Arc<AspaArray>>,
    new_array: Option<AspaArray>,
    failed: Option<usize>,
    error: Option<UpdateError>,
    state: UpdateState,
}

impl<C> AspaUpdate<C> {
    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    pub fn result(&self) -> Result<(), UpdateError> {
        match &self.error {
            None => Ok(()),
            Some(e) => Err(e.clone()),
        }
    }

    /// Sorted and annotated operations.
    pub fn operations(&self) -> &[AspaUpdateOperation] {
        &self.operations
    }

    pub fn failed_operation(&self) -> Option<&AspaUpdateOperation> {
        self.failed.map(|i| &self.operations[i])
    }

    /// The computed array while it is unpublished. Partial if the compute
    /// failed.
    pub fn new_array(&self) -> Option<&AspaArray> {
        self.new_array.as_ref()
    }
}

impl<C: Debug> AspaUpdate<C> {
    /// Releases the update. The published table is not touched.
    pub fn finish(self) {
        tracing::debug!(
            connection = ?self.connection,
            state = ?self.state,
            discarded = self.new_array.as_ref().map_or(0, AspaArray::len),
            retired = match self.state {
                UpdateState::Applied => self.base.as_ref().map_or(0, |a| a.len()),
                _ => 0,
            },
            "finished aspa update"
        );
    }
}

impl<C> AspaTable<C, SwapIn>
where
    C: Eq + Hash + Clone + Debug,
{
    /// Plans `operations` against `connection`'s published array and builds
    /// the resulting array. The table is not modified.
    pub fn compute_update(&self, connection: &C, operations: Vec<AspaUpdateOperation>) -> AspaUpdate<C> {
        let mut operations = operations;
        let node = self.store.find(connection);
        let base = node.and_then(|h| self.store.array(h)).cloned();
        let base_version = node.and_then(|h| self.store.version(h));

        let empty = AspaArray::new();
        let existing = base.as_deref().unwrap_or(&empty);
        let plan = planner::plan(&mut operations, existing);

        let mut failed = plan.failure.as_ref().map(|f| f.op);
        let mut error = plan.failure.as_ref().map(|f| f.error.clone());
        let stop = failed.map(|i| operations[i].customer_asn());

        let inserts = plan
            .edits
            .iter()
            .filter(|e| matches!(e, Edit::Insert { .. }))
            .count();
        let removes = plan.edits.len() - inserts;
        let mut new_array = AspaArray::new();
        match new_array.try_reserve(existing.len() + inserts - removes) {
            Ok(()) => build(&mut new_array, existing, &operations, &plan.edits, stop),
            Err(e) => {
                failed = None;
                error = Some(e);
            }
        }

        let state = match &error {
            None => {
                tracing::debug!(
                    ?connection,
                    operations = operations.len(),
                    records = new_array.len(),
                    "computed aspa update"
                );
                UpdateState::Computed
            }
            Some(e) => {
                tracing::warn!(
                    ?connection,
                    index = e.failed_index(),
                    customer_asn = failed.map(|i| operations[i].customer_asn()),
                    status = %e.status(),
                    "aspa update rejected"
                );
                UpdateState::Failed
            }
        };

        AspaUpdate {
            connection: connection.clone(),
            operations,
            node,
            base_version,
            base,
            new_array: Some(new_array),
            failed,
            error,
            state,
        }
    }

    /// Publishes a computed update and notifies listeners.
    ///
    /// Fails with [`UpdateError::NotApplicable`] unless the update is in the
    /// [`Computed`](UpdateState::Computed) state, and with
    /// [`UpdateError::StaleUpdate`] if the connection's array changed since
    /// the compute. The table is untouched on failure.
    pub fn apply_update(&mut self, update: &mut AspaUpdate<C>) -> Result<(), UpdateError> {
        if update.state != UpdateState::Computed {
            return Err(UpdateError::NotApplicable);
        }
        let stale = match update.node {
            Some(h) => self.store.version(h) != update.base_version,
            None => self.store.find(&update.connection).is_some(),
        };
        if stale {
            return Err(UpdateError::StaleUpdate);
        }
        let new_array = Arc::new(update.new_array.take().ok_or(UpdateError::NotApplicable)?);
        let records = new_array.len();

        match update.node {
            Some(h) => {
                let slot = self.store.array_mut(h).ok_or(UpdateError::StaleUpdate)?;
                // The old reference stays alive in `update.base` until finish.
                let _retired = std::mem::replace(slot, new_array);
            }
            None => {
                let h = self
                    .store
                    .insert(update.connection.clone(), new_array)
                    .map_err(|_| UpdateError::StaleUpdate)?;
                update.node = Some(h);
            }
        }
        update.state = UpdateState::Applied;
        tracing::debug!(connection = ?update.connection, records, "applied aspa update");

        self.dispatcher.notify_batch(
            &update.connection,
            &update.operations,
            self.config().notify_no_ops,
            false,
        );
        Ok(())
    }
}

/// Interleaves surviving existing records with inserted ones. With `stop`
/// set (the customer ASN of the failing operation) existing records are only
/// copied up to that customer.
fn build(
    out: &mut AspaArray,
    existing: &AspaArray,
    operations: &[AspaUpdateOperation],
    edits: &[Edit],
    stop: Option<u32>,
) {
    let records = existing.as_slice();
    let mut cursor = 0;
    for edit in edits {
        match *edit {
            Edit::Insert { op, at } => {
                out.extend_from(&records[cursor..at]);
                cursor = at;
                out.push(operations[op].record().clone());
            }
            Edit::Remove { at, .. } => {
                out.extend_from(&records[cursor..at]);
                cursor = at + 1;
            }
        }
    }
    let tail = &records[cursor..];
    let end = match stop {
        None => tail.len(),
        Some(asn) => tail.partition_point(|r| r.customer_asn() < asn),
    };
    out.extend_from(&tail[..end]);
}
