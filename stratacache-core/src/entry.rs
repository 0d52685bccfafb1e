//! # Cache Entry Types Module
//!
//! This module defines the data model shared by every cache layer:
//!
//! - [`RawValue`]: the opaque encoded byte string layers store.
//! - [`CacheEntry`]: a typed value paired with an optional absolute expiry.
//! - [`CacheSetEntry`]: the storage-level hash entry — a concurrent
//!   element-key → value map sharing a single expiry.
//! - [`CacheSet`]: the typed snapshot of a hash entry handed back to
//!   callers by the stack facade.
//! - [`CacheUpdateType`]: the mutation classification carried on change
//!   events.
//!
//! ## Concurrency
//!
//! A [`CacheSetEntry`] wraps its element map in an `Arc<DashMap>` so clones
//! share one map and per-element mutation is safe under concurrent readers
//! and writers. The in-memory layer stores these entries directly and
//! mutates the embedded map in place.
//!
//! ## Expiry semantics
//!
//! Expiries are absolute UTC timestamps floored to the second. A `None`
//! expiry means "no expiry tracked at this level"; only the owning store's
//! native TTL, if any, applies. An expiry is replaced wholesale on each
//! full-hash write, never merged.

use chrono::{DateTime, SubsecRound, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Encoded byte representation of a cached value.
pub type RawValue = Vec<u8>;

/// A single cached value with its absolute expiry.
///
/// Equality is structural. The expiry is floored to the second on
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    /// The cached value, if one is present.
    pub value: Option<T>,
    /// Absolute UTC expiry, floored to the second.
    pub expiry: Option<DateTime<Utc>>,
}

impl<T> CacheEntry<T> {
    /// Create an entry, flooring the expiry to whole seconds.
    pub fn new(value: Option<T>, expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            value,
            expiry: expiry.map(|e| e.trunc_subsecs(0)),
        }
    }

    /// Whether the entry's expiry has passed at `now`.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.map(|e| e <= now).unwrap_or(false)
    }
}

/// Storage-level hash entry: a concurrent element map sharing one expiry.
///
/// Clones share the underlying element map, so an entry stored in a layer
/// and an entry held by a caller observe each other's element mutations.
/// The expiry is per-clone and is replaced wholesale by full-hash writes.
#[derive(Debug, Clone)]
pub struct CacheSetEntry {
    elements: Arc<DashMap<String, RawValue>>,
    expiry: Option<DateTime<Utc>>,
}

impl CacheSetEntry {
    /// Create an empty entry with the given expiry.
    pub fn new(expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            elements: Arc::new(DashMap::new()),
            expiry: expiry.map(|e| e.trunc_subsecs(0)),
        }
    }

    /// Create an entry populated from an iterator of encoded elements.
    pub fn with_elements<I>(elements: I, expiry: Option<DateTime<Utc>>) -> Self
    where
        I: IntoIterator<Item = (String, RawValue)>,
    {
        let entry = Self::new(expiry);
        for (key, value) in elements {
            entry.elements.insert(key, value);
        }
        entry
    }

    /// The entry's absolute expiry, if one is tracked.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// Replace the entry's expiry wholesale.
    pub fn set_expiry(&mut self, expiry: Option<DateTime<Utc>>) {
        self.expiry = expiry.map(|e| e.trunc_subsecs(0));
    }

    /// Fetch a single element's encoded value.
    pub fn get(&self, element_key: &str) -> Option<RawValue> {
        self.elements.get(element_key).map(|v| v.value().clone())
    }

    /// Insert or replace a single element in place.
    pub fn insert(&self, element_key: impl Into<String>, value: RawValue) {
        self.elements.insert(element_key.into(), value);
    }

    /// Remove a single element in place.
    pub fn remove(&self, element_key: &str) -> Option<RawValue> {
        self.elements.remove(element_key).map(|(_, v)| v)
    }

    /// Remove a batch of elements in place.
    pub fn remove_many(&self, element_keys: &[String]) {
        for key in element_keys {
            self.elements.remove(key);
        }
    }

    /// Whether the element map contains `element_key`.
    pub fn contains(&self, element_key: &str) -> bool {
        self.elements.contains_key(element_key)
    }

    /// The requested elements that are resident, which may be empty.
    pub fn subset(&self, element_keys: &[String]) -> HashMap<String, RawValue> {
        element_keys
            .iter()
            .filter_map(|key| self.get(key).map(|value| (key.clone(), value)))
            .collect()
    }

    /// A point-in-time copy of every element.
    pub fn snapshot(&self) -> HashMap<String, RawValue> {
        self.elements
            .iter()
            .map(|pair| (pair.key().clone(), pair.value().clone()))
            .collect()
    }

    /// Number of resident elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the element map is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl PartialEq for CacheSetEntry {
    fn eq(&self, other: &Self) -> bool {
        self.expiry == other.expiry && self.snapshot() == other.snapshot()
    }
}

impl Eq for CacheSetEntry {}

/// Typed snapshot of a hash entry returned by the stack facade.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSet<T> {
    /// Decoded element-key → value pairs.
    pub elements: HashMap<String, T>,
    /// The expiry shared by every element.
    pub expiry: Option<DateTime<Utc>>,
}

impl<T: Clone> CacheSet<T> {
    /// View a single element together with the set's shared expiry.
    pub fn entry(&self, element_key: &str) -> CacheEntry<T> {
        CacheEntry::new(self.elements.get(element_key).cloned(), self.expiry)
    }
}

/// Classification of a cache mutation, carried on change events.
///
/// Only [`CacheUpdateType::AddOrUpdate`] triggers remote invalidation;
/// further values are reserved for extension authors.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUpdateType {
    /// An entry or element was added or replaced.
    AddOrUpdate,
}
