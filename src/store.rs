//! ConnectionStore: the set of (connection, array) nodes owned by a table.
//!
//! Nodes live in a slot map and are addressed by generational handles, so a
//! handle taken before a node was removed never resolves to a node created
//! later for the same or another connection. A hash index maps a connection
//! to its node; iteration follows insertion order.

use crate::record::AspaArray;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct NodeHandle(DefaultKey);

#[derive(Debug)]
struct StoreNode<C> {
    connection: C,
    array: Arc<AspaArray>,
    // Bumped on every mutable access to `array`.
    version: u64,
    hash: u64,
}

#[derive(Debug)]
pub(crate) enum InsertError {
    DuplicateKey,
}

#[derive(Debug)]
pub(crate) struct ConnectionStore<C, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, StoreNode<C>>,
    order: Vec<DefaultKey>,
}

impl<C> ConnectionStore<C>
where
    C: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<C, S> ConnectionStore<C, S>
where
    C: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find(&self, connection: &C) -> Option<NodeHandle> {
        let hash = self.hasher.hash_one(connection);
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|n| &n.connection == connection)
                    .unwrap_or(false)
            })
            .map(|&k| NodeHandle(k))
    }

    pub fn insert(&mut self, connection: C, array: Arc<AspaArray>) -> Result<NodeHandle, InsertError> {
        let hash = self.hasher.hash_one(&connection);
        match self.index.entry(
            hash,
            |&kk| {
                self.slots
                    .get(kk)
                    .map(|n| n.connection == connection)
                    .unwrap_or(false)
            },
            |&kk| self.slots.get(kk).map(|n| n.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => Err(InsertError::DuplicateKey),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let k = self.slots.insert(StoreNode {
                    connection,
                    array,
                    version: 0,
                    hash,
                });
                let _ = v.insert(k);
                self.order.push(k);
                Ok(NodeHandle(k))
            }
        }
    }

    pub fn remove(&mut self, handle: NodeHandle) -> Option<(C, Arc<AspaArray>)> {
        let k = handle.0;
        let node = self.slots.remove(k)?;
        if let Ok(entry) = self.index.find_entry(node.hash, |&kk| kk == k) {
            entry.remove();
        }
        self.order.retain(|&o| o != k);
        Some((node.connection, node.array))
    }

    pub fn array(&self, handle: NodeHandle) -> Option<&Arc<AspaArray>> {
        self.slots.get(handle.0).map(|n| &n.array)
    }

    /// Mutable access to a node's array. Counts as a change for
    /// [`version`](Self::version) whether or not the caller writes.
    pub fn array_mut(&mut self, handle: NodeHandle) -> Option<&mut Arc<AspaArray>> {
        self.slots.get_mut(handle.0).map(|n| {
            n.version += 1;
            &mut n.array
        })
    }

    pub fn version(&self, handle: NodeHandle) -> Option<u64> {
        self.slots.get(handle.0).map(|n| n.version)
    }

    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &C, &Arc<AspaArray>)> {
        self.order.iter().filter_map(move |&k| {
            self.slots
                .get(k)
                .map(|n| (NodeHandle(k), &n.connection, &n.array))
        })
    }

    /// Empties the store, yielding nodes in insertion order.
    pub fn drain(&mut self) -> Vec<(C, Arc<AspaArray>)> {
        self.index.clear();
        let mut slots = std::mem::take(&mut self.slots);
        std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|k| slots.remove(k))
            .map(|n| (n.connection, n.array))
            .collect()
    }
}
