//! In-place updates: edit the published array, undo on demand, clean up.
//!
//! Every edit performed is appended to a log; undo walks the log backwards
//! and applies the inverse of each entry, so the array returns to its exact
//! pre-update content. Readers must be excluded for the duration of
//! `update` and `undo`, which `&mut self` enforces. A reader holding an
//! [`array`](AspaTable::array) snapshot keeps the old content: the first edit
//! copies a shared array instead of mutating it.

use crate::error::UpdateError;
use crate::operation::AspaUpdateOperation;
use crate::planner::{self, Edit};
use crate::record::{AspaArray, AspaRecord};
use crate::store::NodeHandle;
use crate::strategy::InPlace;
use crate::table::AspaTable;
use core::fmt::Debug;
use core::hash::Hash;
use std::sync::Arc;

/// A performed edit and what is needed to reverse it. `at` is the index in
/// the array as it was when the edit ran.
#[derive(Clone, Debug)]
enum LoggedEdit {
    Inserted { at: usize },
    Removed { at: usize, record: AspaRecord },
}

/// Outcome of [`AspaTable::update`]. Must be passed to
/// [`cleanup`](Self::cleanup), after an optional
/// [`undo_update`](AspaTable::undo_update).
#[must_use = "an in-place update must be cleaned up"]
#[derive(Debug)]
pub struct InPlaceUpdate<C> {
    connection: C,
    operations: Vec<AspaUpdateOperation>,
    node: Option<NodeHandle>,
    created_node: bool,
    // Node version right after this update's last edit.
    version: Option<u64>,
    log: Vec<LoggedEdit>,
    failed: Option<usize>,
    error: Option<UpdateError>,
    notified: bool,
    undone: bool,
}

impl<C> InPlaceUpdate<C> {
    pub fn connection(&self) -> &C {
        &self.connection
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

    /// Number of edits performed and not undone.
    pub fn performed(&self) -> usize {
        self.log.len()
    }

    pub fn is_undone(&self) -> bool {
        self.undone
    }
}

impl<C: Debug> InPlaceUpdate<C> {
    /// Releases the operations and any records removed from the array.
    pub fn cleanup(self) {
        tracing::debug!(
            connection = ?self.connection,
            operations = self.operations.len(),
            performed = self.log.len(),
            undone = self.undone,
            "cleaned up aspa update"
        );
    }
}

impl<C> AspaTable<C, InPlace>
where
    C: Eq + Hash + Clone + Debug,
{
    /// Applies `operations` directly to `connection`'s array, stopping at the
    /// first rejected operation. Edits made before it stay in place until
    /// [`undo_update`](Self::undo_update).
    pub fn update(&mut self, connection: &C, operations: Vec<AspaUpdateOperation>) -> InPlaceUpdate<C> {
        let mut update = InPlaceUpdate {
            connection: connection.clone(),
            operations,
            node: None,
            created_node: false,
            version: None,
            log: Vec::new(),
            failed: None,
            error: None,
            notified: false,
            undone: false,
        };

        let node = match self.store.find(connection) {
            Some(h) => h,
            None => match self.store.insert(connection.clone(), Arc::new(AspaArray::new())) {
                Ok(h) => {
                    update.created_node = true;
                    h
                }
                Err(_) => {
                    update.error = Some(UpdateError::UnknownNode);
                    return update;
                }
            },
        };
        update.node = Some(node);

        let plan = match self.store.array(node) {
            Some(existing) => planner::plan(&mut update.operations, existing),
            None => {
                update.error = Some(UpdateError::UnknownNode);
                return update;
            }
        };

        if let Some(slot) = self.store.array_mut(node) {
            let array = Arc::make_mut(slot);
            match perform(array, &update.operations, &plan.edits) {
                Ok(log) => update.log = log,
                Err(e) => update.error = Some(e),
            }
        }
        update.version = self.store.version(node);

        if update.error.is_none() {
            if let Some(f) = plan.failure {
                update.failed = Some(f.op);
                update.error = Some(f.error);
            }
        }

        match &update.error {
            None => {
                tracing::debug!(
                    ?connection,
                    operations = update.operations.len(),
                    edits = update.log.len(),
                    "updated aspa array in place"
                );
                self.dispatcher.notify_batch(
                    connection,
                    &update.operations,
                    self.config().notify_no_ops,
                    false,
                );
                update.notified = true;
            }
            Some(e) => {
                tracing::warn!(
                    ?connection,
                    index = e.failed_index(),
                    customer_asn = update.failed.map(|i| update.operations[i].customer_asn()),
                    status = %e.status(),
                    performed = update.log.len(),
                    "aspa update rejected"
                );
            }
        }
        update
    }

    /// Reverts every edit `update` performed, newest first. A connection
    /// created by the update is dropped again. Listeners that were told about
    /// a successful update are told about its reversal.
    ///
    /// Fails without touching the table if the array changed after the
    /// update or the update was already undone.
    pub fn undo_update(&mut self, update: &mut InPlaceUpdate<C>) -> Result<(), UpdateError> {
        if update.undone {
            return Err(UpdateError::NotApplicable);
        }
        let node = update.node.ok_or(UpdateError::UnknownNode)?;
        match self.store.version(node) {
            None => return Err(UpdateError::UnknownNode),
            Some(v) if Some(v) != update.version => return Err(UpdateError::StaleUpdate),
            Some(_) => {}
        }

        let slot = self.store.array_mut(node).ok_or(UpdateError::UnknownNode)?;
        let array = Arc::make_mut(slot);
        let reverted = update.log.len();
        for edit in update.log.drain(..).rev() {
            match edit {
                LoggedEdit::Inserted { at } => {
                    let _ = array.remove_at(at);
                }
                LoggedEdit::Removed { at, record } => array.insert_at(at, record),
            }
        }
        update.undone = true;

        if update.created_node {
            let _ = self.store.remove(node);
        }
        tracing::debug!(connection = ?update.connection, reverted, "undid aspa update");

        if update.notified {
            self.dispatcher.notify_batch(
                &update.connection,
                &update.operations,
                self.config().notify_no_ops,
                true,
            );
        }
        Ok(())
    }
}

/// Runs `edits` against `array`, returning the log of what was done.
fn perform(
    array: &mut AspaArray,
    operations: &[AspaUpdateOperation],
    edits: &[Edit],
) -> Result<Vec<LoggedEdit>, UpdateError> {
    let inserts = edits
        .iter()
        .filter(|e| matches!(e, Edit::Insert { .. }))
        .count();
    array.try_reserve(inserts)?;

    let mut log = Vec::new();
    log.try_reserve(edits.len())
        .map_err(|_| UpdateError::Allocation { requested: edits.len() })?;

    // Positions in the plan refer to the array before any edit.
    let (mut inserted, mut removed) = (0usize, 0usize);
    for edit in edits {
        match *edit {
            Edit::Insert { op, at } => {
                let at = at + inserted - removed;
                array.insert_at(at, operations[op].record().clone());
                tracing::trace!(customer_asn = operations[op].customer_asn(), at, "inserted aspa record");
                log.push(LoggedEdit::Inserted { at });
                inserted += 1;
            }
            Edit::Remove { op, at } => {
                let at = at + inserted - removed;
                let record = array.remove_at(at);
                tracing::trace!(customer_asn = operations[op].customer_asn(), at, "removed aspa record");
                log.push(LoggedEdit::Removed { at, record });
                removed += 1;
            }
        }
    }
    Ok(log)
}
