//! AspaTable: per-connection ASPA arrays, listeners and lookups.

use crate::config::TableConfig;
use crate::notify::{AspaListener, ChangeKind, Dispatcher, ListenerId};
use crate::record::AspaArray;
use crate::store::ConnectionStore;
use crate::strategy::{Mechanism, SwapIn};
use crate::verification::{self, AsPathDirection, AspaVerificationResult, HopResult};
use core::fmt::Debug;
use core::hash::Hash;
use core::marker::PhantomData;
use std::sync::Arc;

/// ASPA data for one connection group, keyed by connection identity.
///
/// `M` fixes the update mechanism for the table's lifetime: [`SwapIn`]
/// exposes [`compute_update`](AspaTable::compute_update) and friends,
/// [`InPlace`](crate::InPlace) exposes [`update`](AspaTable::update). Both
/// implement [`UpdateStrategy`](crate::UpdateStrategy).
///
/// Lookups take `&self` and may run on any number of threads, concurrently
/// with a swap-in compute. Anything that changes a published array takes
/// `&mut self`; readers that need to outlive such a change keep an
/// [`array`](AspaTable::array) snapshot.
pub struct AspaTable<C, M = SwapIn> {
    pub(crate) store: ConnectionStore<C>,
    pub(crate) dispatcher: Dispatcher<C>,
    config: TableConfig,
    _mechanism: PhantomData<fn() -> M>,
}

impl<C, M> Debug for AspaTable<C, M>
where
    C: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AspaTable")
            .field("store", &self.store)
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish()
    }
}

impl<C, M> Default for AspaTable<C, M>
where
    C: Eq + Hash + Clone + Debug,
    M: Mechanism,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C, M> AspaTable<C, M>
where
    C: Eq + Hash + Clone + Debug,
    M: Mechanism,
{
    pub fn new() -> Self {
        Self::with_config(TableConfig::default())
    }

    pub fn with_config(config: TableConfig) -> Self {
        Self {
            store: ConnectionStore::new(),
            dispatcher: Dispatcher::default(),
            config,
            _mechanism: PhantomData,
        }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn connection_count(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Connections in the order their data first arrived.
    pub fn connections(&self) -> impl Iterator<Item = &C> {
        self.store.iter().map(|(_, c, _)| c)
    }

    /// Snapshot of the array currently published for `connection`.
    pub fn array(&self, connection: &C) -> Option<Arc<AspaArray>> {
        let h = self.store.find(connection)?;
        self.store.array(h).cloned()
    }

    pub fn register_listener<L>(&mut self, listener: L) -> ListenerId
    where
        L: AspaListener<C> + 'static,
    {
        self.dispatcher.register(Arc::new(listener))
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> bool {
        self.dispatcher.unregister(id)
    }

    /// Checks a hop against the merged data of every connection.
    pub fn check_hop(&self, customer_asn: u32, provider_asn: u32) -> HopResult {
        let mut found = false;
        for (_, _, array) in self.store.iter() {
            match array.check_hop(customer_asn, provider_asn) {
                HopResult::ProviderPlus => return HopResult::ProviderPlus,
                HopResult::NotProviderPlus => found = true,
                HopResult::NoAttestation => {}
            }
        }
        if found {
            HopResult::NotProviderPlus
        } else {
            HopResult::NoAttestation
        }
    }

    /// Checks a hop against one connection's data only.
    pub fn check_hop_for(&self, connection: &C, customer_asn: u32, provider_asn: u32) -> HopResult {
        self.store
            .find(connection)
            .and_then(|h| self.store.array(h))
            .map_or(HopResult::NoAttestation, |a| a.check_hop(customer_asn, provider_asn))
    }

    /// Verifies an AS_PATH given neighbour first, origin last.
    pub fn verify_as_path(&self, as_path: &[u32], direction: AsPathDirection) -> AspaVerificationResult {
        verification::verify_as_path(as_path, direction, |c, p| self.check_hop(c, p))
    }

    /// Drops all data received over `connection`. Returns whether there was
    /// any.
    pub fn remove_connection(&mut self, connection: &C, notify: bool) -> bool {
        let Some(h) = self.store.find(connection) else {
            return false;
        };
        let Some((connection, array)) = self.store.remove(h) else {
            return false;
        };
        tracing::debug!(?connection, records = array.len(), "removed aspa connection");
        if notify {
            self.dispatcher
                .notify_all(&connection, array.iter(), ChangeKind::Removed);
        }
        true
    }

    /// Drops every connection.
    pub fn clear(&mut self, notify: bool) {
        for (connection, array) in self.store.drain() {
            tracing::debug!(?connection, records = array.len(), "removed aspa connection");
            if notify {
                self.dispatcher
                    .notify_all(&connection, array.iter(), ChangeKind::Removed);
            }
        }
    }

    /// Moves `connection`'s array from `src` into this table, replacing
    /// whatever this table held for it. If `src` holds nothing for the
    /// connection, this table's data for it is dropped.
    ///
    /// With `notify_dst` this table's listeners see the previous records
    /// removed and the moved records added; with `notify_src` the listeners
    /// of `src` see the moved records removed.
    pub fn replace_connection_from<M2>(
        &mut self,
        src: &mut AspaTable<C, M2>,
        connection: &C,
        notify_dst: bool,
        notify_src: bool,
    ) where
        M2: Mechanism,
    {
        let moved = src
            .store
            .find(connection)
            .and_then(|h| src.store.remove(h))
            .map(|(_, array)| array);

        if notify_src {
            if let Some(array) = &moved {
                src.dispatcher
                    .notify_all(connection, array.iter(), ChangeKind::Removed);
            }
        }

        let previous = match (self.store.find(connection), &moved) {
            (Some(h), Some(array)) => self
                .store
                .array_mut(h)
                .map(|slot| std::mem::replace(slot, array.clone())),
            (Some(h), None) => self.store.remove(h).map(|(_, array)| array),
            (None, Some(array)) => {
                let inserted = self.store.insert(connection.clone(), array.clone());
                debug_assert!(inserted.is_ok(), "connection absent before insert");
                None
            }
            (None, None) => None,
        };

        tracing::debug!(
            ?connection,
            previous = previous.as_ref().map_or(0, |a| a.len()),
            records = moved.as_ref().map_or(0, |a| a.len()),
            "replaced aspa connection data"
        );

        if notify_dst {
            if let Some(array) = &previous {
                self.dispatcher
                    .notify_all(connection, array.iter(), ChangeKind::Removed);
            }
            if let Some(array) = &moved {
                self.dispatcher
                    .notify_all(connection, array.iter(), ChangeKind::Added);
            }
        }
    }
}
