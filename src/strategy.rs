//! Update mechanisms and the mechanism-independent batch entry point.

use crate::error::UpdateError;
use crate::notify::BatchReport;
use crate::operation::AspaUpdateOperation;
use crate::table::AspaTable;
use core::fmt::Debug;
use core::hash::Hash;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::SwapIn {}
    impl Sealed for super::InPlace {}
}

/// Marker for a table's update mechanism.
pub trait Mechanism: sealed::Sealed + 'static {}

/// Build a new array beside the published one and swap it in. Readers are
/// never exposed to a partially applied batch.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SwapIn;

/// Edit the published array directly and undo on failure. Readers must be
/// excluded while an update runs.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct InPlace;

impl Mechanism for SwapIn {}
impl Mechanism for InPlace {}

/// Applies a whole batch with the table's mechanism.
pub trait UpdateStrategy<C> {
    /// On failure the table is left exactly as it was before the call.
    fn apply_batch(
        &mut self,
        connection: &C,
        operations: Vec<AspaUpdateOperation>,
    ) -> Result<BatchReport, UpdateError>;
}

impl<C> UpdateStrategy<C> for AspaTable<C, SwapIn>
where
    C: Eq + Hash + Clone + Debug,
{
    fn apply_batch(
        &mut self,
        connection: &C,
        operations: Vec<AspaUpdateOperation>,
    ) -> Result<BatchReport, UpdateError> {
        let mut update = self.compute_update(connection, operations);
        let res = update
            .result()
            .and_then(|()| self.apply_update(&mut update))
            .map(|()| BatchReport::from_operations(update.operations()));
        update.finish();
        res
    }
}

impl<C> UpdateStrategy<C> for AspaTable<C, InPlace>
where
    C: Eq + Hash + Clone + Debug,
{
    fn apply_batch(
        &mut self,
        connection: &C,
        operations: Vec<AspaUpdateOperation>,
    ) -> Result<BatchReport, UpdateError> {
        let mut update = self.update(connection, operations);
        let res = match update.result() {
            Ok(()) => Ok(BatchReport::from_operations(update.operations())),
            Err(e) => {
                if let Err(undo) = self.undo_update(&mut update) {
                    tracing::warn!(?connection, error = %undo, "undo of failed aspa update failed");
                }
                Err(e)
            }
        };
        update.cleanup();
        res
    }
}
