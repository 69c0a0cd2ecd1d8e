//! Status codes and update errors.

use std::fmt;

/// Outcome of an update as reported across the crate boundary.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AspaStatus {
    Success,
    /// Allocation or internal failure; fatal to the current update.
    Error,
    RecordNotFound,
    DuplicateRecord,
}

impl fmt::Display for AspaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AspaStatus::Success => "success",
            AspaStatus::Error => "error",
            AspaStatus::RecordNotFound => "record not found",
            AspaStatus::DuplicateRecord => "duplicate record",
        })
    }
}

impl<T> From<&Result<T, UpdateError>> for AspaStatus {
    fn from(res: &Result<T, UpdateError>) -> Self {
        match res {
            Ok(_) => AspaStatus::Success,
            Err(e) => e.status(),
        }
    }
}

/// Reason an update batch was rejected.
///
/// `index` always refers to the operation's position in the batch as the
/// caller supplied it, before sorting.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum UpdateError {
    /// An add targets a customer ASN that is already present, either in the
    /// existing array or earlier in the same batch.
    #[error("operation {index}: customer AS{customer_asn} already has a record")]
    DuplicateRecord { index: usize, customer_asn: u32 },

    /// A remove targets a customer ASN that is absent, or was removed earlier
    /// in the same batch.
    #[error("operation {index}: no record for customer AS{customer_asn}")]
    RecordNotFound { index: usize, customer_asn: u32 },

    #[error("failed to allocate room for {requested} records")]
    Allocation { requested: usize },

    /// The connection's published array changed between compute and apply.
    #[error("published array changed since the update was computed")]
    StaleUpdate,

    /// The update already ran to its end state: a failed compute, a second
    /// apply, or a second undo.
    #[error("update cannot be applied in its current state")]
    NotApplicable,

    #[error("connection node no longer exists")]
    UnknownNode,
}

impl UpdateError {
    pub fn status(&self) -> AspaStatus {
        match self {
            UpdateError::DuplicateRecord { .. } => AspaStatus::DuplicateRecord,
            UpdateError::RecordNotFound { .. } => AspaStatus::RecordNotFound,
            UpdateError::Allocation { .. }
            | UpdateError::StaleUpdate
            | UpdateError::NotApplicable
            | UpdateError::UnknownNode => AspaStatus::Error,
        }
    }

    /// Batch position of the rejected operation, if a single operation caused
    /// the failure.
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            UpdateError::DuplicateRecord { index, .. } | UpdateError::RecordNotFound { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }
}
