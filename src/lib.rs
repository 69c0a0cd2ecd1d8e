//! aspa-table: ASPA (Autonomous System Provider Authorization) data for
//! route validation, kept per RPKI cache connection and updated in batches.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: apply ordered add/remove batches received from a cache to the
//!   table while lookups keep running, and fail whole batches cleanly.
//! - Layers:
//!   - AspaRecord / AspaArray: a customer ASN with its sorted provider set,
//!     and an array of records sorted by customer ASN, unique per array.
//!   - planner: sorts a batch, classifies duplicates, unknown removals and
//!     complementary pairs, and merges the batch against an array into a
//!     list of edits.
//!   - ConnectionStore: generational slot map of (connection, array) nodes
//!     with a hash index and insertion-order iteration.
//!   - AspaTable<C, M>: public API. `M` selects the update mechanism:
//!     `SwapIn` (compute, apply, finish) or `InPlace` (update, undo,
//!     cleanup). `UpdateStrategy::apply_batch` drives either one.
//!
//! Constraints
//! - Arrays stay sorted and unique after every operation, including a
//!   failed or undone one.
//! - A batch is atomic when driven through `apply_batch`: on failure the
//!   table is exactly as it was and listeners heard nothing.
//! - Notifications report net changes only, in sorted order, after the
//!   batch has been applied.
//!
//! Concurrency
//! - Lookups and swap-in computes take `&self`; publishing takes `&mut self`.
//!   Wrap the table in a `RwLock` to share it. Published arrays are
//!   reference counted, so a reader holding a snapshot from
//!   [`AspaTable::array`] is unaffected by later updates.
//!
//! Provider sets
//! - Shared (`Arc<[u32]>`) between the operation that introduced them and
//!   every array that carries them; building a new array copies references,
//!   not provider lists.

mod config;
mod error;
mod in_place;
mod notify;
mod operation;
mod planner;
mod planner_proptest;
mod record;
mod store;
mod strategy;
mod swap_in;
mod table;
mod verification;

// Public surface
pub use config::TableConfig;
pub use error::{AspaStatus, UpdateError};
pub use in_place::InPlaceUpdate;
pub use notify::{AspaListener, BatchReport, ChangeKind, ListenerId};
pub use operation::{AspaUpdateOperation, OperationType};
pub use record::{AspaArray, AspaRecord};
pub use strategy::{InPlace, Mechanism, SwapIn, UpdateStrategy};
pub use swap_in::{AspaUpdate, UpdateState};
pub use table::AspaTable;
pub use verification::{collapse_as_path, AsPathDirection, AspaVerificationResult, HopResult};
