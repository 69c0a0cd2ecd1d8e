//! Per-table configuration.

/// Settings fixed for the lifetime of an [`AspaTable`](crate::AspaTable).
///
/// The update mechanism is not part of this struct: it is the table's type
/// parameter, see [`SwapIn`](crate::SwapIn) and [`InPlace`](crate::InPlace).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TableConfig {
    /// Report both halves of a complementary add/remove pair to listeners.
    /// Off unless the `notify-no-ops` feature is enabled.
    pub notify_no_ops: bool,
}

impl TableConfig {
    pub fn with_notify_no_ops(mut self, on: bool) -> Self {
        self.notify_no_ops = on;
        self
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            notify_no_ops: cfg!(feature = "notify-no-ops"),
        }
    }
}
