//! # Cache Stack Module
//!
//! The read-through/write-through facade over an ordered array of cache
//! layers. Layers are provided in priority order from nearest (fastest) to
//! furthest; at least one layer is required.
//!
//! ## Read path
//!
//! A read walks the layers front-to-back, skipping layers that report
//! themselves unavailable, until a layer produces a hit. The hit is then
//! back-populated into every closer available layer before it is returned,
//! so subsequent reads resolve at the front of the stack. Hash-subset reads
//! accumulate partial hits across layers, narrowing the requested key set
//! as elements are found.
//!
//! ## Write path
//!
//! A write (including evictions and flushes) is applied to every layer in
//! index order, awaiting each before the next; the first failure aborts the
//! chain. After all layers complete, the matching change event is fanned
//! out through the extension container.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use chrono::{Duration, Utc};
//! use stratacache_core::memory::MemoryCacheLayer;
//! use stratacache_core::stack::CacheStack;
//!
//! let stack = CacheStack::builder()
//!     .layer(Arc::new(MemoryCacheLayer::new()))
//!     .build()
//!     .await?;
//!
//! let pages = HashMap::from([("home".to_string(), 1u64)]);
//! stack.set_hash("views", &pages, Utc::now() + Duration::hours(1)).await?;
//! let count: Option<u64> = stack.get_value("views", "home").await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::codec::{decode_value, encode_value, CacheCodec, JsonCodec};
use crate::entry::{CacheSet, CacheSetEntry, CacheUpdateType, RawValue};
use crate::error::{CacheError, CacheResult};
use crate::extensions::{CacheExtension, ExtensionContainer};
use crate::layer::CacheLayer;

/// Builder for [`CacheStack`].
pub struct CacheStackBuilder {
    layers: Vec<Arc<dyn CacheLayer>>,
    extensions: Vec<Arc<dyn CacheExtension>>,
    codec: Arc<dyn CacheCodec>,
}

impl CacheStackBuilder {
    fn new() -> Self {
        Self {
            layers: Vec::new(),
            extensions: Vec::new(),
            codec: Arc::new(JsonCodec),
        }
    }

    /// Append a layer. Layers are consulted in the order they are added,
    /// nearest first.
    pub fn layer(mut self, layer: Arc<dyn CacheLayer>) -> Self {
        self.layers.push(layer);
        self
    }

    /// Append an extension. Extensions are registered and notified in the
    /// order they are added.
    pub fn extension(mut self, extension: Arc<dyn CacheExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Replace the default JSON codec.
    pub fn codec(mut self, codec: Arc<dyn CacheCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Build the stack and register every extension against it.
    pub async fn build(self) -> CacheResult<Arc<CacheStack>> {
        if self.layers.is_empty() {
            return Err(CacheError::usage("at least one cache layer is required"));
        }
        let stack = Arc::new(CacheStack {
            layers: self.layers,
            extensions: ExtensionContainer::new(self.extensions),
            codec: self.codec,
            disposed: AtomicBool::new(false),
        });
        stack.extensions.register(&stack).await?;
        Ok(stack)
    }
}

/// Ordered read-through/write-through facade over an array of cache layers.
pub struct CacheStack {
    layers: Vec<Arc<dyn CacheLayer>>,
    extensions: ExtensionContainer,
    codec: Arc<dyn CacheCodec>,
    disposed: AtomicBool,
}

impl CacheStack {
    /// Start building a stack.
    pub fn builder() -> CacheStackBuilder {
        CacheStackBuilder::new()
    }

    /// Number of layers in the stack.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn ensure_live(&self) -> CacheResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(CacheError::Disposed);
        }
        Ok(())
    }

    fn require_key(name: &str, key: &str) -> CacheResult<()> {
        if key.is_empty() {
            return Err(CacheError::usage(format!("{name} must be a non-empty string")));
        }
        Ok(())
    }

    fn require_keys(name: &str, keys: &[String]) -> CacheResult<()> {
        for key in keys {
            Self::require_key(name, key)?;
        }
        Ok(())
    }

    fn decode_subset<T: DeserializeOwned>(
        &self,
        raw: HashMap<String, RawValue>,
    ) -> CacheResult<HashMap<String, T>> {
        raw.into_iter()
            .map(|(key, value)| {
                decode_value(self.codec.as_ref(), &value).map(|decoded| (key, decoded))
            })
            .collect()
    }

    fn decode_set<T: DeserializeOwned>(&self, entry: &CacheSetEntry) -> CacheResult<CacheSet<T>> {
        Ok(CacheSet {
            elements: self.decode_subset(entry.snapshot())?,
            expiry: entry.expiry(),
        })
    }

    fn encode_elements<T: Serialize>(
        &self,
        elements: &HashMap<String, T>,
    ) -> CacheResult<HashMap<String, RawValue>> {
        elements
            .iter()
            .map(|(key, value)| {
                Self::require_key("element key", key)?;
                encode_value(self.codec.as_ref(), value).map(|encoded| (key.clone(), encoded))
            })
            .collect()
    }

    async fn back_populate_value(
        &self,
        hit_index: usize,
        hash_key: &str,
        element_key: &str,
        value: &RawValue,
    ) -> CacheResult<()> {
        for (index, layer) in self.layers[..hit_index].iter().enumerate() {
            if layer.is_available().await {
                layer.set_value(hash_key, element_key, value.clone()).await?;
            } else {
                tracing::debug!(layer = index, hash_key, "skipped back-population of unavailable layer");
            }
        }
        Ok(())
    }

    async fn back_populate_hash(
        &self,
        hit_index: usize,
        hash_key: &str,
        entry: &CacheSetEntry,
    ) -> CacheResult<()> {
        for (index, layer) in self.layers[..hit_index].iter().enumerate() {
            if layer.is_available().await {
                layer.set_hash(hash_key, entry).await?;
            } else {
                tracing::debug!(layer = index, hash_key, "skipped back-population of unavailable layer");
            }
        }
        Ok(())
    }

    async fn back_populate_subset(
        &self,
        hit_index: usize,
        hash_key: &str,
        subset: &HashMap<String, RawValue>,
    ) -> CacheResult<()> {
        for (index, layer) in self.layers[..hit_index].iter().enumerate() {
            if layer.is_available().await {
                layer.set_hash_subset(hash_key, subset).await?;
            } else {
                tracing::debug!(layer = index, hash_key, "skipped back-population of unavailable layer");
            }
        }
        Ok(())
    }

    /// Read one element of a hash entry, back-populating closer layers on
    /// a deep hit. Returns `None` when no layer holds the element.
    pub async fn get_value<T: DeserializeOwned>(
        &self,
        hash_key: &str,
        element_key: &str,
    ) -> CacheResult<Option<T>> {
        self.ensure_live()?;
        Self::require_key("hash key", hash_key)?;
        Self::require_key("element key", element_key)?;

        for (index, layer) in self.layers.iter().enumerate() {
            if !layer.is_available().await {
                tracing::debug!(layer = index, hash_key, "skipping unavailable cache layer");
                continue;
            }
            if let Some(raw) = layer.get_value(hash_key, element_key).await? {
                if index > 0 {
                    self.back_populate_value(index, hash_key, element_key, &raw)
                        .await?;
                }
                return decode_value(self.codec.as_ref(), &raw).map(Some);
            }
        }
        Ok(None)
    }

    /// Write one element of a hash entry to every layer. The element
    /// inherits whatever expiry the hash already carries at each layer.
    pub async fn set_value<T: Serialize>(
        &self,
        hash_key: &str,
        element_key: &str,
        value: &T,
    ) -> CacheResult<()> {
        self.ensure_live()?;
        Self::require_key("hash key", hash_key)?;
        Self::require_key("element key", element_key)?;

        let raw = encode_value(self.codec.as_ref(), value)?;
        for layer in &self.layers {
            layer.set_value(hash_key, element_key, raw.clone()).await?;
        }
        self.extensions
            .on_hash_element_update(hash_key, element_key, None, CacheUpdateType::AddOrUpdate)
            .await
    }

    /// Remove one element of a hash entry from every layer.
    pub async fn evict_value(&self, hash_key: &str, element_key: &str) -> CacheResult<()> {
        self.ensure_live()?;
        Self::require_key("hash key", hash_key)?;
        Self::require_key("element key", element_key)?;

        for layer in &self.layers {
            layer.evict_value(hash_key, element_key).await?;
        }
        self.extensions
            .on_hash_element_eviction(hash_key, element_key)
            .await
    }

    /// Read an entire hash entry, back-populating closer layers on a deep
    /// hit. Returns `None` when no layer holds the key.
    pub async fn get_hash<T: DeserializeOwned>(
        &self,
        hash_key: &str,
    ) -> CacheResult<Option<CacheSet<T>>> {
        self.ensure_live()?;
        Self::require_key("hash key", hash_key)?;

        for (index, layer) in self.layers.iter().enumerate() {
            if !layer.is_available().await {
                tracing::debug!(layer = index, hash_key, "skipping unavailable cache layer");
                continue;
            }
            if let Some(entry) = layer.get_hash(hash_key).await? {
                if index > 0 {
                    self.back_populate_hash(index, hash_key, &entry).await?;
                }
                return self.decode_set(&entry).map(Some);
            }
        }
        Ok(None)
    }

    /// Write an entire hash entry to every layer, replacing any previous
    /// entry and its expiry wholesale.
    pub async fn set_hash<T: Serialize>(
        &self,
        hash_key: &str,
        elements: &HashMap<String, T>,
        expiry: DateTime<Utc>,
    ) -> CacheResult<()> {
        self.ensure_live()?;
        Self::require_key("hash key", hash_key)?;

        let entry =
            CacheSetEntry::with_elements(self.encode_elements(elements)?, Some(expiry.trunc_subsecs(0)));
        for layer in &self.layers {
            layer.set_hash(hash_key, &entry).await?;
        }
        self.extensions
            .on_cache_update(hash_key, entry.expiry(), CacheUpdateType::AddOrUpdate)
            .await
    }

    /// Remove an entire hash entry from every layer.
    pub async fn evict_hash(&self, hash_key: &str) -> CacheResult<()> {
        self.ensure_live()?;
        Self::require_key("hash key", hash_key)?;

        for layer in &self.layers {
            layer.evict_hash(hash_key).await?;
        }
        self.extensions.on_cache_eviction(hash_key).await
    }

    /// Read a subset of a hash entry's elements.
    ///
    /// Partial hits accumulate across layers: each layer is asked only for
    /// the keys still missing, its results are back-populated into closer
    /// layers, and the walk stops as soon as the request is satisfied. The
    /// result contains only the requested elements that were found and is
    /// empty when none were.
    pub async fn get_hash_subset<T: DeserializeOwned>(
        &self,
        hash_key: &str,
        element_keys: &[String],
    ) -> CacheResult<HashMap<String, T>> {
        self.ensure_live()?;
        Self::require_key("hash key", hash_key)?;
        Self::require_keys("element key", element_keys)?;

        if element_keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut accumulated: HashMap<String, RawValue> = HashMap::new();
        let mut remaining: Vec<String> = element_keys.to_vec();

        for (index, layer) in self.layers.iter().enumerate() {
            if !layer.is_available().await {
                tracing::debug!(layer = index, hash_key, "skipping unavailable cache layer");
                continue;
            }
            let Some(found) = layer.get_hash_subset(hash_key, &remaining).await? else {
                continue;
            };
            if index > 0 && !found.is_empty() {
                self.back_populate_subset(index, hash_key, &found).await?;
            }
            // A single layer satisfying the whole request is by definition
            // the complete answer.
            if found.len() == element_keys.len() {
                return self.decode_subset(found);
            }
            accumulated.extend(found);
            if accumulated.len() == element_keys.len() {
                return self.decode_subset(accumulated);
            }
            remaining.retain(|key| !accumulated.contains_key(key));
        }
        self.decode_subset(accumulated)
    }

    /// Write a batch of elements to every layer without touching expiries.
    pub async fn set_hash_subset<T: Serialize>(
        &self,
        hash_key: &str,
        elements: &HashMap<String, T>,
    ) -> CacheResult<()> {
        self.ensure_live()?;
        Self::require_key("hash key", hash_key)?;

        let subset = self.encode_elements(elements)?;
        for layer in &self.layers {
            layer.set_hash_subset(hash_key, &subset).await?;
        }
        let element_keys: Vec<String> = subset.into_keys().collect();
        self.extensions
            .on_hash_subset_update(hash_key, &element_keys, None, CacheUpdateType::AddOrUpdate)
            .await
    }

    /// Remove a batch of elements from every layer.
    pub async fn evict_hash_subset(
        &self,
        hash_key: &str,
        element_keys: &[String],
    ) -> CacheResult<()> {
        self.ensure_live()?;
        Self::require_key("hash key", hash_key)?;
        Self::require_keys("element key", element_keys)?;

        for layer in &self.layers {
            layer.evict_hash_subset(hash_key, element_keys).await?;
        }
        self.extensions
            .on_hash_subset_eviction(hash_key, element_keys)
            .await
    }

    /// Replace the expiry of a hash entry at every layer. Emits no change
    /// event.
    pub async fn set_hash_expiry(&self, hash_key: &str, expiry: DateTime<Utc>) -> CacheResult<()> {
        self.ensure_live()?;
        Self::require_key("hash key", hash_key)?;

        let expiry = expiry.trunc_subsecs(0);
        for layer in &self.layers {
            layer.set_hash_expiry(hash_key, expiry).await?;
        }
        Ok(())
    }

    /// Compact expired entries out of every layer.
    pub async fn cleanup(&self) -> CacheResult<()> {
        self.ensure_live()?;
        for layer in &self.layers {
            layer.cleanup().await?;
        }
        Ok(())
    }

    /// Dispose the stack: layers first, then the extension container.
    /// Idempotent; subsequent operations fail with [`CacheError::Disposed`].
    pub async fn dispose(&self) -> CacheResult<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for layer in &self.layers {
            if let Err(error) = layer.dispose().await {
                tracing::warn!(error = %error, "failed to dispose cache layer");
            }
        }
        self.extensions.dispose().await;
        Ok(())
    }
}

/// Narrow surface for the database-wide flush, kept off [`CacheStack`]'s
/// inherent API so callers opt in explicitly.
#[async_trait]
pub trait FlushableCacheStack: Send + Sync {
    /// Remove every entry from every layer, then notify observers.
    async fn flush(&self) -> CacheResult<()>;
}

#[async_trait]
impl FlushableCacheStack for CacheStack {
    async fn flush(&self) -> CacheResult<()> {
        self.ensure_live()?;
        for layer in &self.layers {
            layer.flush().await?;
        }
        self.extensions.on_cache_flush().await
    }
}
