//! ASPA records and the sorted array backing each connection.

use crate::verification::HopResult;
use std::sync::Arc;

/// A customer AS and the provider ASes it has authorized.
///
/// Providers are kept sorted and free of duplicates. The provider set is
/// immutable and reference counted: cloning a record shares the set rather
/// than copying it, and an array built by an update holds the same set as
/// the operation that introduced it. The set is freed with its last holder.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AspaRecord {
    customer_asn: u32,
    providers: Arc<[u32]>,
}

impl AspaRecord {
    pub fn new<I>(customer_asn: u32, providers: I) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        let mut v: Vec<u32> = providers.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        Self {
            customer_asn,
            providers: v.into(),
        }
    }

    /// A record carrying only the customer ASN, as used by remove operations.
    pub(crate) fn bare(customer_asn: u32) -> Self {
        Self {
            customer_asn,
            providers: Arc::from(Vec::new()),
        }
    }

    pub(crate) fn with_providers(&self, providers: Arc<[u32]>) -> Self {
        Self {
            customer_asn: self.customer_asn,
            providers,
        }
    }

    pub fn customer_asn(&self) -> u32 {
        self.customer_asn
    }

    pub fn providers(&self) -> &[u32] {
        &self.providers
    }

    pub(crate) fn provider_set(&self) -> &Arc<[u32]> {
        &self.providers
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn has_provider(&self, provider_asn: u32) -> bool {
        self.providers.binary_search(&provider_asn).is_ok()
    }
}

/// Records strictly ascending and unique by customer ASN.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AspaArray {
    records: Vec<AspaRecord>,
}

impl AspaArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an array from records in any order. Returns `None` if two
    /// records share a customer ASN.
    pub fn from_records<I>(records: I) -> Option<Self>
    where
        I: IntoIterator<Item = AspaRecord>,
    {
        let mut records: Vec<AspaRecord> = records.into_iter().collect();
        records.sort_by_key(AspaRecord::customer_asn);
        if records
            .windows(2)
            .any(|w| w[0].customer_asn == w[1].customer_asn)
        {
            return None;
        }
        Some(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AspaRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[AspaRecord] {
        &self.records
    }

    /// `Ok(i)` if the customer is at `i`, else `Err(i)` with the insertion
    /// point keeping the array sorted.
    pub fn position(&self, customer_asn: u32) -> Result<usize, usize> {
        self.records
            .binary_search_by_key(&customer_asn, AspaRecord::customer_asn)
    }

    pub fn find(&self, customer_asn: u32) -> Option<&AspaRecord> {
        self.position(customer_asn)
            .ok()
            .map(|i| &self.records[i])
    }

    pub fn check_hop(&self, customer_asn: u32, provider_asn: u32) -> HopResult {
        match self.find(customer_asn) {
            None => HopResult::NoAttestation,
            Some(r) if r.has_provider(provider_asn) => HopResult::ProviderPlus,
            Some(_) => HopResult::NotProviderPlus,
        }
    }

    pub(crate) fn try_reserve(&mut self, additional: usize) -> Result<(), crate::UpdateError> {
        self.records
            .try_reserve(additional)
            .map_err(|_| crate::UpdateError::Allocation {
                requested: self.records.len().saturating_add(additional),
            })
    }

    /// Append a record; caller keeps ascending order.
    pub(crate) fn push(&mut self, record: AspaRecord) {
        debug_assert!(self
            .records
            .last()
            .map_or(true, |last| last.customer_asn < record.customer_asn));
        self.records.push(record);
    }

    pub(crate) fn extend_from(&mut self, records: &[AspaRecord]) {
        debug_assert!(match (self.records.last(), records.first()) {
            (Some(last), Some(first)) => last.customer_asn < first.customer_asn,
            _ => true,
        });
        self.records.extend_from_slice(records);
    }

    pub(crate) fn insert_at(&mut self, at: usize, record: AspaRecord) {
        debug_assert!(at == 0 || self.records[at - 1].customer_asn < record.customer_asn);
        debug_assert!(at == self.records.len() || record.customer_asn < self.records[at].customer_asn);
        self.records.insert(at, record);
    }

    pub(crate) fn remove_at(&mut self, at: usize) -> AspaRecord {
        self.records.remove(at)
    }
}

impl<'a> IntoIterator for &'a AspaArray {
    type Item = &'a AspaRecord;
    type IntoIter = std::slice::Iter<'a, AspaRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
