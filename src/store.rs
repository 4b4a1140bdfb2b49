//! Cache Partition Store
//!
//! Named, versioned key → response partitions. A partition is identified
//! by its full versioned name (`"{base}-{version}"`); bumping the version
//! creates a fresh partition and orphans the old one for deletion at the
//! next activation sweep.
//!
//! Every put is a single atomic map replace, so a torn-down invocation
//! can never leave a half-written entry behind.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::request::{Response, ResponseSource};

// ── Constants ───────────────────────────────────────────────

/// Default byte quota across all partitions (25 MB).
pub const DEFAULT_QUOTA: usize = 25 * 1024 * 1024;

/// Estimated per-entry overhead on top of the body bytes.
const ENTRY_OVERHEAD: usize = 256;

// ── Types ───────────────────────────────────────────────────

/// A partition identity: stable logical base name plus a version suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionName {
    base: String,
    version: String,
}

impl PartitionName {
    /// Create a partition name from a base and a version.
    pub fn new(base: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            version: version.into(),
        }
    }

    /// The stable logical base name.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The version identifier.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The full versioned name that identifies the partition.
    pub fn full(&self) -> String {
        alloc::format!("{}-{}", self.base, self.version)
    }
}

/// A stored response entry.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// Response body bytes
    pub body: Vec<u8>,
    /// Monotonic store-order stamp (used for LRU eviction)
    pub stored_at: u64,
    /// Size in bytes (body + overhead)
    pub size: usize,
}

impl StoredResponse {
    fn from_response(response: &Response, stored_at: u64) -> Self {
        Self {
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            stored_at,
            size: response.body.len() + ENTRY_OVERHEAD,
        }
    }

    /// Rebuild a response descriptor, tagged as a cache hit.
    pub fn to_response(&self) -> Response {
        let mut response = Response::new(self.status).with_source(ResponseSource::Cache);
        response.headers = self.headers.clone();
        response.body = self.body.clone();
        response
    }
}

/// Store operation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The entry cannot fit within the store quota, even after eviction.
    QuotaExceeded,
    /// The named partition does not exist.
    PartitionNotFound,
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StoreError::QuotaExceeded => write!(f, "partition store quota exceeded"),
            StoreError::PartitionNotFound => write!(f, "partition not found"),
        }
    }
}

/// A single named partition: key → stored response, last write wins.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Full versioned partition name.
    name: String,
    entries: BTreeMap<String, StoredResponse>,
    total_size: usize,
}

impl Partition {
    fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            entries: BTreeMap::new(),
            total_size: 0,
        }
    }

    /// Full versioned name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an entry by key.
    pub fn get(&self, key: &str) -> Option<&StoredResponse> {
        self.entries.get(key)
    }

    /// Insert an entry, replacing any prior value for the key.
    fn put(&mut self, key: &str, entry: StoredResponse) -> usize {
        let added = entry.size;
        if let Some(old) = self.entries.remove(key) {
            self.total_size = self.total_size.saturating_sub(old.size);
        }
        self.total_size += added;
        self.entries.insert(String::from(key), entry);
        added
    }

    /// Delete an entry by key.
    pub fn delete(&mut self, key: &str) -> bool {
        if let Some(old) = self.entries.remove(key) {
            self.total_size = self.total_size.saturating_sub(old.size);
            true
        } else {
            false
        }
    }

    /// All entry keys.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|k| k.as_str()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this partition has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of entries in this partition.
    pub fn size(&self) -> usize {
        self.total_size
    }

    /// Evict the oldest entry by store-order stamp.
    fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, v)| v.stored_at)
            .map(|(k, _)| k.clone());
        if let Some(ref key) = oldest {
            self.delete(key);
        }
        oldest
    }

    fn oldest_stamp(&self) -> u64 {
        self.entries
            .values()
            .map(|e| e.stored_at)
            .min()
            .unwrap_or(u64::MAX)
    }
}

// ── PartitionStore ──────────────────────────────────────────

/// The store holding every partition for this agent's origin.
pub struct PartitionStore {
    partitions: BTreeMap<String, Partition>,
    quota: usize,
    total_size: usize,
    /// Monotonic stamp source for entry store order.
    next_stamp: AtomicU64,
}

impl PartitionStore {
    /// Create a store with the default quota.
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA)
    }

    /// Create a store with an explicit byte quota.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            partitions: BTreeMap::new(),
            quota,
            total_size: 0,
            next_stamp: AtomicU64::new(1),
        }
    }

    /// Open (or create) a partition by full name. Idempotent.
    pub fn open(&mut self, name: &str) -> &mut Partition {
        if !self.partitions.contains_key(name) {
            self.partitions
                .insert(String::from(name), Partition::new(name));
        }
        self.partitions.get_mut(name).expect("partition just opened")
    }

    /// Check if a partition exists.
    pub fn has(&self, name: &str) -> bool {
        self.partitions.contains_key(name)
    }

    /// All partition names.
    pub fn partition_names(&self) -> Vec<String> {
        self.partitions.keys().cloned().collect()
    }

    /// Delete a whole partition. Returns whether it existed.
    pub fn delete_partition(&mut self, name: &str) -> bool {
        if let Some(partition) = self.partitions.remove(name) {
            self.total_size = self.total_size.saturating_sub(partition.size());
            true
        } else {
            false
        }
    }

    /// Store a response under `key` in the named partition, creating the
    /// partition if absent. Overwrites any prior entry for the key.
    /// Evicts oldest entries if needed; fails with `QuotaExceeded` if the
    /// entry cannot fit at all.
    pub fn put(&mut self, partition: &str, key: &str, response: &Response) -> Result<(), StoreError> {
        let stamp = self.next_stamp.fetch_add(1, Ordering::Relaxed);
        let entry = StoredResponse::from_response(response, stamp);

        if entry.size > self.quota {
            return Err(StoreError::QuotaExceeded);
        }
        if self.total_size + entry.size > self.quota {
            self.evict_to_fit(entry.size)?;
        }

        let target = self.open(partition);
        // Replacing an entry shrinks before it grows; recompute from parts.
        target.put(key, entry);
        self.total_size = self.partitions.values().map(|p| p.size()).sum();
        Ok(())
    }

    /// Look up a response in a specific partition.
    pub fn get(&self, partition: &str, key: &str) -> Option<Response> {
        self.partitions
            .get(partition)?
            .get(key)
            .map(|e| e.to_response())
    }

    /// Look up a response across all partitions, preferring `first` if it
    /// holds the key.
    pub fn match_key(&self, key: &str, first: &str) -> Option<Response> {
        if let Some(found) = self.get(first, key) {
            return Some(found);
        }
        for (name, partition) in &self.partitions {
            if name == first {
                continue;
            }
            if let Some(entry) = partition.get(key) {
                return Some(entry.to_response());
            }
        }
        None
    }

    /// Delete one entry from a partition.
    pub fn delete(&mut self, partition: &str, key: &str) -> Result<bool, StoreError> {
        let target = self
            .partitions
            .get_mut(partition)
            .ok_or(StoreError::PartitionNotFound)?;
        let removed = target.delete(key);
        if removed {
            self.total_size = self.partitions.values().map(|p| p.size()).sum();
        }
        Ok(removed)
    }

    /// Access a partition immutably.
    pub fn partition(&self, name: &str) -> Option<&Partition> {
        self.partitions.get(name)
    }

    /// Total bytes currently stored.
    pub fn usage(&self) -> usize {
        self.total_size
    }

    /// The store quota in bytes.
    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Evict oldest entries across all partitions until `needed` bytes fit.
    fn evict_to_fit(&mut self, needed: usize) -> Result<(), StoreError> {
        while self.total_size + needed > self.quota {
            let oldest_partition = self
                .partitions
                .iter()
                .filter(|(_, p)| !p.is_empty())
                .min_by_key(|(_, p)| p.oldest_stamp())
                .map(|(name, _)| name.clone());

            let Some(name) = oldest_partition else {
                return Err(StoreError::QuotaExceeded);
            };
            if let Some(partition) = self.partitions.get_mut(&name) {
                if partition.evict_oldest().is_none() {
                    return Err(StoreError::QuotaExceeded);
                }
            }
            self.total_size = self.partitions.values().map(|p| p.size()).sum();
        }
        Ok(())
    }
}

impl Default for PartitionStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_response(body: &[u8]) -> Response {
        Response::new(200).with_body(body.to_vec())
    }

    #[test]
    fn partition_name_full() {
        let name = PartitionName::new("app-static", "v3");
        assert_eq!(name.full(), "app-static-v3");
        assert_eq!(name.base(), "app-static");
        assert_eq!(name.version(), "v3");
    }

    #[test]
    fn open_is_idempotent() {
        let mut store = PartitionStore::new();
        store.open("static-v1");
        store.open("static-v1");
        assert_eq!(store.partition_names().len(), 1);
    }

    #[test]
    fn put_and_get() {
        let mut store = PartitionStore::new();
        store.put("static-v1", "/index.html", &ok_response(b"<html>")).unwrap();

        let found = store.get("static-v1", "/index.html").unwrap();
        assert_eq!(found.body, b"<html>");
        assert_eq!(found.status, 200);
        assert_eq!(found.source, ResponseSource::Cache);
    }

    #[test]
    fn put_overwrites_last_write_wins() {
        let mut store = PartitionStore::new();
        store.put("static-v1", "/a", &ok_response(b"one")).unwrap();
        store.put("static-v1", "/a", &ok_response(b"two")).unwrap();

        assert_eq!(store.partition("static-v1").unwrap().len(), 1);
        assert_eq!(store.get("static-v1", "/a").unwrap().body, b"two");
    }

    #[test]
    fn get_missing_partition() {
        let store = PartitionStore::new();
        assert!(store.get("nope", "/a").is_none());
    }

    #[test]
    fn delete_entry() {
        let mut store = PartitionStore::new();
        store.put("runtime-v1", "/a", &ok_response(b"x")).unwrap();
        assert!(store.delete("runtime-v1", "/a").unwrap());
        assert!(!store.delete("runtime-v1", "/a").unwrap());
        assert!(store.get("runtime-v1", "/a").is_none());
    }

    #[test]
    fn delete_entry_missing_partition() {
        let mut store = PartitionStore::new();
        assert_eq!(
            store.delete("nope", "/a"),
            Err(StoreError::PartitionNotFound)
        );
    }

    #[test]
    fn delete_partition_frees_usage() {
        let mut store = PartitionStore::new();
        store.put("old-v1", "/a", &ok_response(b"abc")).unwrap();
        let used = store.usage();
        assert!(used > 0);
        assert!(store.delete_partition("old-v1"));
        assert_eq!(store.usage(), 0);
        assert!(!store.has("old-v1"));
    }

    #[test]
    fn match_key_prefers_first_partition() {
        let mut store = PartitionStore::new();
        store.put("static-v1", "/a", &ok_response(b"static")).unwrap();
        store.put("runtime-v1", "/a", &ok_response(b"runtime")).unwrap();

        let found = store.match_key("/a", "static-v1").unwrap();
        assert_eq!(found.body, b"static");
    }

    #[test]
    fn match_key_falls_through_partitions() {
        let mut store = PartitionStore::new();
        store.put("runtime-v1", "/b", &ok_response(b"runtime")).unwrap();

        let found = store.match_key("/b", "static-v1").unwrap();
        assert_eq!(found.body, b"runtime");
    }

    #[test]
    fn quota_evicts_oldest_first() {
        // Quota fits two entries, then the oldest is evicted.
        let mut store = PartitionStore::with_quota(2 * (10 + 256) + 8);
        store.put("p", "/a", &ok_response(&[0u8; 10])).unwrap();
        store.put("p", "/b", &ok_response(&[0u8; 10])).unwrap();
        store.put("p", "/c", &ok_response(&[0u8; 10])).unwrap();

        assert!(store.get("p", "/a").is_none());
        assert!(store.get("p", "/b").is_some());
        assert!(store.get("p", "/c").is_some());
    }

    #[test]
    fn oversized_entry_rejected() {
        let mut store = PartitionStore::with_quota(128);
        let err = store.put("p", "/big", &ok_response(&[0u8; 4096]));
        assert_eq!(err, Err(StoreError::QuotaExceeded));
    }
}
