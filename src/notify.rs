//! Change notifications for listeners caching derived validation results.

use crate::operation::{AspaUpdateOperation, OperationType};
use crate::record::AspaRecord;
use slotmap::SlotMap;
use std::sync::Arc;

slotmap::new_key_type! {
    /// Registration handle returned by
    /// [`AspaTable::register_listener`](crate::AspaTable::register_listener).
    pub struct ListenerId;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChangeKind {
    Added,
    Removed,
}

/// Receives every record added to or removed from a table.
pub trait AspaListener<C>: Send + Sync {
    fn record_changed(&self, connection: &C, record: &AspaRecord, change: ChangeKind);
}

impl<C, F> AspaListener<C> for F
where
    F: Fn(&C, &AspaRecord, ChangeKind) + Send + Sync,
{
    fn record_changed(&self, connection: &C, record: &AspaRecord, change: ChangeKind) {
        self(connection, record, change)
    }
}

pub(crate) struct Dispatcher<C> {
    listeners: SlotMap<ListenerId, Arc<dyn AspaListener<C>>>,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self {
            listeners: SlotMap::with_key(),
        }
    }
}

impl<C> std::fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<C: std::fmt::Debug> Dispatcher<C> {
    pub fn register(&mut self, listener: Arc<dyn AspaListener<C>>) -> ListenerId {
        self.listeners.insert(listener)
    }

    pub fn unregister(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn notify(&self, connection: &C, record: &AspaRecord, change: ChangeKind) {
        tracing::trace!(?connection, customer_asn = record.customer_asn(), ?change, "aspa record change");
        for listener in self.listeners.values() {
            listener.record_changed(connection, record, change);
        }
    }

    pub fn notify_all<'a, I>(&self, connection: &C, records: I, change: ChangeKind)
    where
        I: IntoIterator<Item = &'a AspaRecord>,
    {
        if self.is_empty() {
            return;
        }
        for record in records {
            self.notify(connection, record, change);
        }
    }

    /// Reports the net effect of a fully applied batch, in sorted order.
    /// `inverse` reports every change reversed and newest first, as after an
    /// undo, so replaying both sequences leaves a listener where it started.
    pub fn notify_batch(&self, connection: &C, ops: &[AspaUpdateOperation], notify_no_ops: bool, inverse: bool) {
        if self.is_empty() {
            return;
        }
        let changes = batch_changes(ops, notify_no_ops);
        if !inverse {
            for (record, change) in changes {
                self.notify(connection, record, change);
            }
            return;
        }
        for (record, change) in changes.rev() {
            let change = match change {
                ChangeKind::Added => ChangeKind::Removed,
                ChangeKind::Removed => ChangeKind::Added,
            };
            self.notify(connection, record, change);
        }
    }
}

/// Net changes of a fully applied batch.
pub(crate) fn batch_changes(
    ops: &[AspaUpdateOperation],
    notify_no_ops: bool,
) -> impl DoubleEndedIterator<Item = (&AspaRecord, ChangeKind)> {
    ops.iter()
        .filter(move |op| if op.is_no_op() { notify_no_ops } else { !op.skip() })
        .map(|op| {
            let change = match op.kind() {
                OperationType::Add => ChangeKind::Added,
                OperationType::Remove => ChangeKind::Removed,
            };
            (op.record(), change)
        })
}

/// Counts of a batch's effect.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchReport {
    pub added: usize,
    pub removed: usize,
    /// Operations cancelled as halves of complementary pairs.
    pub no_ops: usize,
}

impl BatchReport {
    pub(crate) fn from_operations(ops: &[AspaUpdateOperation]) -> Self {
        let mut report = BatchReport::default();
        for op in ops {
            if op.is_no_op() {
                report.no_ops += 1;
            } else if !op.skip() {
                match op.kind() {
                    OperationType::Add => report.added += 1,
                    OperationType::Remove => report.removed += 1,
                }
            }
        }
        report
    }
}
