//! Add and remove operations making up an update batch.

use crate::record::AspaRecord;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OperationType {
    Add,
    Remove,
}

/// One entry of an update batch.
///
/// `is_no_op` and `skip` are derived while planning and cannot be set by the
/// caller. After a remove has been matched against the existing array its
/// record carries the removed provider set so listeners can be told what went
/// away.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AspaUpdateOperation {
    index: usize,
    kind: OperationType,
    record: AspaRecord,
    pub(crate) is_no_op: bool,
    pub(crate) skip: bool,
}

impl AspaUpdateOperation {
    /// `index` is the operation's position in the batch as received.
    pub fn add<I>(index: usize, customer_asn: u32, providers: I) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        Self::add_record(index, AspaRecord::new(customer_asn, providers))
    }

    pub fn add_record(index: usize, record: AspaRecord) -> Self {
        Self {
            index,
            kind: OperationType::Add,
            record,
            is_no_op: false,
            skip: false,
        }
    }

    pub fn remove(index: usize, customer_asn: u32) -> Self {
        Self {
            index,
            kind: OperationType::Remove,
            record: AspaRecord::bare(customer_asn),
            is_no_op: false,
            skip: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> OperationType {
        self.kind
    }

    pub fn customer_asn(&self) -> u32 {
        self.record.customer_asn()
    }

    pub fn record(&self) -> &AspaRecord {
        &self.record
    }

    pub(crate) fn set_record(&mut self, record: AspaRecord) {
        debug_assert_eq!(record.customer_asn(), self.record.customer_asn());
        self.record = record;
    }

    /// Half of a complementary add/remove pair.
    pub fn is_no_op(&self) -> bool {
        self.is_no_op
    }

    /// Resolved while planning; performs no array change.
    pub fn skip(&self) -> bool {
        self.skip
    }
}
