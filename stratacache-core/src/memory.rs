//! # In-Memory Cache Layer Module
//!
//! The process-local tier of a cache stack. Entries live in a concurrent
//! map keyed by hash-table key; each entry embeds its own concurrent
//! element map, so per-element operations mutate in place without locking
//! the whole store.
//!
//! Reads treat an entry whose expiry has passed as absent; the entry is
//! dropped lazily on the next read or during [`cleanup`]. The layer is
//! always available.
//!
//! [`cleanup`]: MemoryCacheLayer::cleanup

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::entry::{CacheSetEntry, RawValue};
use crate::error::CacheResult;
use crate::layer::CacheLayer;

/// In-process cache layer with TTL-aware reads and bulk compaction.
#[derive(Debug)]
pub struct MemoryCacheLayer {
    entries: DashMap<String, CacheSetEntry>,
    clock: Arc<dyn Clock>,
}

impl MemoryCacheLayer {
    /// Create a layer backed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a layer with an injected clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    fn has_expired(&self, entry: &CacheSetEntry) -> bool {
        entry
            .expiry()
            .map(|expiry| expiry <= self.clock.now())
            .unwrap_or(false)
    }

    /// Fetch a live entry, lazily dropping it when its expiry has passed.
    fn live_entry(&self, hash_key: &str) -> Option<CacheSetEntry> {
        let expired = {
            let Some(entry) = self.entries.get(hash_key) else {
                return None;
            };
            if !self.has_expired(entry.value()) {
                return Some(entry.value().clone());
            }
            true
        };
        if expired {
            self.entries.remove(hash_key);
        }
        None
    }
}

impl Default for MemoryCacheLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCacheLayer {
    async fn get_value(&self, hash_key: &str, element_key: &str) -> CacheResult<Option<RawValue>> {
        Ok(self
            .live_entry(hash_key)
            .and_then(|entry| entry.get(element_key)))
    }

    async fn set_value(
        &self,
        hash_key: &str,
        element_key: &str,
        value: RawValue,
    ) -> CacheResult<()> {
        match self.entries.entry(hash_key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if self.has_expired(occupied.get()) {
                    occupied.insert(CacheSetEntry::new(None));
                }
                occupied.get().insert(element_key, value);
            }
            Entry::Vacant(vacant) => {
                let entry = CacheSetEntry::new(None);
                entry.insert(element_key, value);
                vacant.insert(entry);
            }
        }
        Ok(())
    }

    async fn evict_value(&self, hash_key: &str, element_key: &str) -> CacheResult<()> {
        if let Some(entry) = self.live_entry(hash_key) {
            entry.remove(element_key);
        }
        Ok(())
    }

    async fn get_hash(&self, hash_key: &str) -> CacheResult<Option<CacheSetEntry>> {
        Ok(self.live_entry(hash_key))
    }

    async fn set_hash(&self, hash_key: &str, entry: &CacheSetEntry) -> CacheResult<()> {
        self.entries.insert(hash_key.to_string(), entry.clone());
        Ok(())
    }

    async fn evict_hash(&self, hash_key: &str) -> CacheResult<()> {
        self.entries.remove(hash_key);
        Ok(())
    }

    async fn get_hash_subset(
        &self,
        hash_key: &str,
        element_keys: &[String],
    ) -> CacheResult<Option<HashMap<String, RawValue>>> {
        Ok(self
            .live_entry(hash_key)
            .map(|entry| entry.subset(element_keys)))
    }

    async fn set_hash_subset(
        &self,
        hash_key: &str,
        subset: &HashMap<String, RawValue>,
    ) -> CacheResult<()> {
        let target = match self.entries.entry(hash_key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if self.has_expired(occupied.get()) {
                    occupied.insert(CacheSetEntry::new(None));
                }
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => vacant.insert(CacheSetEntry::new(None)).value().clone(),
        };
        for (element_key, value) in subset {
            target.insert(element_key.clone(), value.clone());
        }
        Ok(())
    }

    async fn evict_hash_subset(&self, hash_key: &str, element_keys: &[String]) -> CacheResult<()> {
        if let Some(entry) = self.live_entry(hash_key) {
            entry.remove_many(element_keys);
        }
        Ok(())
    }

    async fn set_hash_expiry(&self, hash_key: &str, expiry: DateTime<Utc>) -> CacheResult<()> {
        if let Some(mut entry) = self.entries.get_mut(hash_key) {
            entry.set_expiry(Some(expiry.trunc_subsecs(0)));
        }
        Ok(())
    }

    async fn cleanup(&self) -> CacheResult<()> {
        let now = self.clock.now();
        self.entries
            .retain(|_, entry| entry.expiry().map(|expiry| expiry > now).unwrap_or(true));
        Ok(())
    }

    async fn flush(&self) -> CacheResult<()> {
        self.entries.clear();
        Ok(())
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;

    fn raw(value: &str) -> RawValue {
        value.as_bytes().to_vec()
    }

    fn seeded_entry(expiry: Option<DateTime<Utc>>) -> CacheSetEntry {
        CacheSetEntry::with_elements(
            [("a".to_string(), raw("1")), ("b".to_string(), raw("2"))],
            expiry,
        )
    }

    #[tokio::test]
    async fn set_value_creates_fresh_entry_without_expiry() {
        let layer = MemoryCacheLayer::new();
        layer.set_value("k", "a", raw("1")).await.unwrap();

        let entry = layer.get_hash("k").await.unwrap().unwrap();
        assert_eq!(entry.expiry(), None);
        assert_eq!(entry.get("a"), Some(raw("1")));
    }

    #[tokio::test]
    async fn subset_read_distinguishes_absent_key_from_partial_hit() {
        let layer = MemoryCacheLayer::new();

        let missing = layer
            .get_hash_subset("k", &["a".to_string()])
            .await
            .unwrap();
        assert!(missing.is_none());

        layer.set_hash("k", &seeded_entry(None)).await.unwrap();
        let partial = layer
            .get_hash_subset("k", &["a".to_string(), "zzz".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(partial.len(), 1);
        assert_eq!(partial.get("a"), Some(&raw("1")));

        let empty = layer
            .get_hash_subset("k", &["zzz".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let layer = MemoryCacheLayer::with_clock(clock.clone());

        let expiry = clock.now() + Duration::seconds(30);
        layer.set_hash("k", &seeded_entry(Some(expiry))).await.unwrap();
        assert!(layer.get_value("k", "a").await.unwrap().is_some());

        clock.advance(Duration::seconds(31));
        assert!(layer.get_value("k", "a").await.unwrap().is_none());
        assert!(layer.get_hash("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cleanup_drops_only_expired_entries() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let layer = MemoryCacheLayer::with_clock(clock.clone());

        let soon = clock.now() + Duration::seconds(5);
        let later = clock.now() + Duration::hours(1);
        layer.set_hash("soon", &seeded_entry(Some(soon))).await.unwrap();
        layer.set_hash("later", &seeded_entry(Some(later))).await.unwrap();
        layer.set_hash("untracked", &seeded_entry(None)).await.unwrap();

        clock.advance(Duration::seconds(10));
        layer.cleanup().await.unwrap();

        assert!(layer.get_hash("soon").await.unwrap().is_none());
        assert!(layer.get_hash("later").await.unwrap().is_some());
        assert!(layer.get_hash("untracked").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn set_hash_replaces_expiry_wholesale() {
        let layer = MemoryCacheLayer::new();
        let first = Utc::now().trunc_subsecs(0) + Duration::hours(2);
        let second = Utc::now().trunc_subsecs(0) + Duration::minutes(5);

        layer.set_hash("k", &seeded_entry(Some(first))).await.unwrap();
        layer.set_hash("k", &seeded_entry(Some(second))).await.unwrap();

        let entry = layer.get_hash("k").await.unwrap().unwrap();
        assert_eq!(entry.expiry(), Some(second));
    }

    #[tokio::test]
    async fn set_hash_expiry_on_absent_key_is_a_no_op() {
        let layer = MemoryCacheLayer::new();
        layer
            .set_hash_expiry("missing", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert!(layer.get_hash("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn flush_clears_everything() {
        let layer = MemoryCacheLayer::new();
        layer.set_hash("k1", &seeded_entry(None)).await.unwrap();
        layer.set_hash("k2", &seeded_entry(None)).await.unwrap();

        layer.flush().await.unwrap();
        assert!(layer.get_hash("k1").await.unwrap().is_none());
        assert!(layer.get_hash("k2").await.unwrap().is_none());
    }
}
