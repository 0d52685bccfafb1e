//! # Extension System Module
//!
//! This module provides the extension pipeline for the cache stack,
//! allowing pluggable observers to react to every mutation the stack
//! performs.
//!
//! ## Overview
//!
//! An extension participates in two capabilities:
//!
//! - **Lifecycle** ([`CacheExtension`]): `register` is called exactly once
//!   when the owning stack is built, and `dispose` when the stack is
//!   disposed. Extensions that need the stack later (for example to drive
//!   periodic maintenance) must downgrade the registration handle to a
//!   [`Weak`] reference; holding a strong reference would create a cycle.
//! - **Change observation** ([`CacheChangeObserver`]): mutation events
//!   fanned out synchronously after each stack write, in registration
//!   order, awaiting each observer before the next. An observer error
//!   propagates out of the triggering stack call.
//!
//! ## Event table
//!
//! | Stack operation     | Event                        |
//! |---------------------|------------------------------|
//! | `set_value`         | `on_hash_element_update`     |
//! | `set_hash`          | `on_cache_update`            |
//! | `set_hash_subset`   | `on_hash_subset_update`      |
//! | `evict_value`       | `on_hash_element_eviction`   |
//! | `evict_hash`        | `on_cache_eviction`          |
//! | `evict_hash_subset` | `on_hash_subset_eviction`    |
//! | `flush`             | `on_cache_flush`             |
//! | `set_hash_expiry`   | none                         |
//!
//! [`Weak`]: std::sync::Weak

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::entry::CacheUpdateType;
use crate::error::{CacheError, CacheResult};
use crate::stack::CacheStack;

pub mod auto_cleanup;
pub mod logging;

pub use auto_cleanup::AutoCleanupExtension;
pub use logging::LoggingExtension;

/// Lifecycle capability implemented by every cache stack extension.
#[async_trait]
pub trait CacheExtension: Send + Sync {
    /// Bind the extension to its owning stack. Called exactly once, during
    /// stack construction.
    async fn register(&self, stack: Arc<CacheStack>) -> CacheResult<()>;

    /// Release resources held by the extension. The default does nothing.
    async fn dispose(&self) -> CacheResult<()> {
        Ok(())
    }

    /// The change-observation view of this extension, when it has one.
    fn as_change_observer(&self) -> Option<&dyn CacheChangeObserver> {
        None
    }
}

/// Change-observation capability for extensions that watch mutations.
///
/// Every method defaults to a no-op so observers implement only the events
/// they care about.
#[async_trait]
pub trait CacheChangeObserver: Send + Sync {
    /// A full hash entry was written.
    async fn on_cache_update(
        &self,
        hash_key: &str,
        expiry: Option<DateTime<Utc>>,
        update: CacheUpdateType,
    ) -> CacheResult<()> {
        let _ = (hash_key, expiry, update);
        Ok(())
    }

    /// A single element of a hash entry was written.
    async fn on_hash_element_update(
        &self,
        hash_key: &str,
        element_key: &str,
        expiry: Option<DateTime<Utc>>,
        update: CacheUpdateType,
    ) -> CacheResult<()> {
        let _ = (hash_key, element_key, expiry, update);
        Ok(())
    }

    /// A batch of elements of a hash entry was written.
    async fn on_hash_subset_update(
        &self,
        hash_key: &str,
        element_keys: &[String],
        expiry: Option<DateTime<Utc>>,
        update: CacheUpdateType,
    ) -> CacheResult<()> {
        let _ = (hash_key, element_keys, expiry, update);
        Ok(())
    }

    /// A whole hash entry was evicted.
    async fn on_cache_eviction(&self, hash_key: &str) -> CacheResult<()> {
        let _ = hash_key;
        Ok(())
    }

    /// A single element was evicted.
    async fn on_hash_element_eviction(&self, hash_key: &str, element_key: &str) -> CacheResult<()> {
        let _ = (hash_key, element_key);
        Ok(())
    }

    /// A batch of elements was evicted.
    async fn on_hash_subset_eviction(
        &self,
        hash_key: &str,
        element_keys: &[String],
    ) -> CacheResult<()> {
        let _ = (hash_key, element_keys);
        Ok(())
    }

    /// Every layer of the stack was flushed.
    async fn on_cache_flush(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// Ordered collection of extensions owned by one cache stack.
///
/// Holds the full extension list for lifecycle calls plus the precomputed
/// positions of members exposing a change-observer view, so event dispatch
/// walks only observers, in registration order.
pub struct ExtensionContainer {
    extensions: Vec<Arc<dyn CacheExtension>>,
    observer_indices: Vec<usize>,
    registered: AtomicBool,
}

impl ExtensionContainer {
    /// Build a container over the given extensions in registration order.
    pub fn new(extensions: Vec<Arc<dyn CacheExtension>>) -> Self {
        let observer_indices = extensions
            .iter()
            .enumerate()
            .filter(|(_, extension)| extension.as_change_observer().is_some())
            .map(|(index, _)| index)
            .collect();
        Self {
            extensions,
            observer_indices,
            registered: AtomicBool::new(false),
        }
    }

    /// Register every extension against the owning stack. A container can
    /// be registered exactly once.
    pub async fn register(&self, stack: &Arc<CacheStack>) -> CacheResult<()> {
        if self.registered.swap(true, Ordering::SeqCst) {
            return Err(CacheError::usage(
                "extension container is already registered to a cache stack",
            ));
        }
        for extension in &self.extensions {
            extension.register(Arc::clone(stack)).await?;
        }
        Ok(())
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether the container holds no extensions.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub(crate) async fn on_cache_update(
        &self,
        hash_key: &str,
        expiry: Option<DateTime<Utc>>,
        update: CacheUpdateType,
    ) -> CacheResult<()> {
        for &index in &self.observer_indices {
            if let Some(observer) = self.extensions[index].as_change_observer() {
                observer.on_cache_update(hash_key, expiry, update).await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn on_hash_element_update(
        &self,
        hash_key: &str,
        element_key: &str,
        expiry: Option<DateTime<Utc>>,
        update: CacheUpdateType,
    ) -> CacheResult<()> {
        for &index in &self.observer_indices {
            if let Some(observer) = self.extensions[index].as_change_observer() {
                observer
                    .on_hash_element_update(hash_key, element_key, expiry, update)
                    .await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn on_hash_subset_update(
        &self,
        hash_key: &str,
        element_keys: &[String],
        expiry: Option<DateTime<Utc>>,
        update: CacheUpdateType,
    ) -> CacheResult<()> {
        for &index in &self.observer_indices {
            if let Some(observer) = self.extensions[index].as_change_observer() {
                observer
                    .on_hash_subset_update(hash_key, element_keys, expiry, update)
                    .await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn on_cache_eviction(&self, hash_key: &str) -> CacheResult<()> {
        for &index in &self.observer_indices {
            if let Some(observer) = self.extensions[index].as_change_observer() {
                observer.on_cache_eviction(hash_key).await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn on_hash_element_eviction(
        &self,
        hash_key: &str,
        element_key: &str,
    ) -> CacheResult<()> {
        for &index in &self.observer_indices {
            if let Some(observer) = self.extensions[index].as_change_observer() {
                observer
                    .on_hash_element_eviction(hash_key, element_key)
                    .await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn on_hash_subset_eviction(
        &self,
        hash_key: &str,
        element_keys: &[String],
    ) -> CacheResult<()> {
        for &index in &self.observer_indices {
            if let Some(observer) = self.extensions[index].as_change_observer() {
                observer
                    .on_hash_subset_eviction(hash_key, element_keys)
                    .await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn on_cache_flush(&self) -> CacheResult<()> {
        for &index in &self.observer_indices {
            if let Some(observer) = self.extensions[index].as_change_observer() {
                observer.on_cache_flush().await?;
            }
        }
        Ok(())
    }

    /// Dispose every extension, logging individual failures rather than
    /// aborting the remaining disposals.
    pub(crate) async fn dispose(&self) {
        for extension in &self.extensions {
            if let Err(error) = extension.dispose().await {
                tracing::warn!(error = %error, "failed to dispose cache extension");
            }
        }
    }
}
