//! # Cache Layer Capability Module
//!
//! This module defines the [`CacheLayer`] trait — the storage capability
//! every tier of a cache stack implements. Layers are byte-level: they
//! store encoded [`RawValue`]s and never see caller types.
//!
//! ## Subset read contract
//!
//! `get_hash_subset` distinguishes two misses:
//!
//! - `Ok(None)`: the top-level hash key is absent at this layer — the stack
//!   keeps searching deeper layers with the same remaining keys.
//! - `Ok(Some(map))`: the hash key is present; the map contains only the
//!   requested element keys that are resident, and may be empty.
//!
//! ## Availability
//!
//! `is_available` is queried by the stack before each read but not before
//! writes. A layer reporting `false` is silently skipped on the read path;
//! a failing write propagates to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::entry::{CacheSetEntry, RawValue};
use crate::error::CacheResult;

/// Storage capability implemented by every cache tier.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Fetch one element of a hash entry.
    async fn get_value(&self, hash_key: &str, element_key: &str) -> CacheResult<Option<RawValue>>;

    /// Store one element of a hash entry, creating the entry (with no
    /// expiry) when it is absent.
    async fn set_value(&self, hash_key: &str, element_key: &str, value: RawValue)
        -> CacheResult<()>;

    /// Remove one element of a hash entry.
    async fn evict_value(&self, hash_key: &str, element_key: &str) -> CacheResult<()>;

    /// Fetch an entire hash entry, or `None` when the key is absent.
    async fn get_hash(&self, hash_key: &str) -> CacheResult<Option<CacheSetEntry>>;

    /// Store an entire hash entry, replacing any previous entry and its
    /// expiry wholesale.
    async fn set_hash(&self, hash_key: &str, entry: &CacheSetEntry) -> CacheResult<()>;

    /// Remove an entire hash entry.
    async fn evict_hash(&self, hash_key: &str) -> CacheResult<()>;

    /// Fetch the requested elements of a hash entry. See the module
    /// documentation for the absent-key versus partial-result contract.
    async fn get_hash_subset(
        &self,
        hash_key: &str,
        element_keys: &[String],
    ) -> CacheResult<Option<HashMap<String, RawValue>>>;

    /// Store a batch of elements without touching the entry's expiry,
    /// creating the entry (with no expiry) when it is absent.
    async fn set_hash_subset(
        &self,
        hash_key: &str,
        subset: &HashMap<String, RawValue>,
    ) -> CacheResult<()>;

    /// Remove a batch of elements from a hash entry.
    async fn evict_hash_subset(&self, hash_key: &str, element_keys: &[String]) -> CacheResult<()>;

    /// Replace the expiry of an existing hash entry; a no-op when the key
    /// is absent.
    async fn set_hash_expiry(&self, hash_key: &str, expiry: DateTime<Utc>) -> CacheResult<()>;

    /// Drop entries whose expiry has passed. Stores that expire on their
    /// own implement this as a no-op.
    async fn cleanup(&self) -> CacheResult<()>;

    /// Remove every entry held by this layer.
    async fn flush(&self) -> CacheResult<()>;

    /// Whether the layer can currently serve requests.
    async fn is_available(&self) -> bool;

    /// Release resources held by the layer. The default does nothing.
    async fn dispose(&self) -> CacheResult<()> {
        Ok(())
    }
}
