//! # Logging Extension Module
//!
//! A change observer that traces every mutation flowing through the cache
//! stack. Useful while developing layer or extension code and as a minimal
//! reference observer implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::entry::CacheUpdateType;
use crate::error::CacheResult;
use crate::extensions::{CacheChangeObserver, CacheExtension};
use crate::stack::CacheStack;

/// Traces cache mutation events, configurable per event class.
#[derive(Debug, Clone)]
pub struct LoggingExtension {
    log_updates: bool,
    log_evictions: bool,
    log_flushes: bool,
}

impl LoggingExtension {
    /// Log every event class.
    pub fn new() -> Self {
        Self {
            log_updates: true,
            log_evictions: true,
            log_flushes: true,
        }
    }

    /// Enable or disable update logging.
    pub fn with_updates(mut self, enabled: bool) -> Self {
        self.log_updates = enabled;
        self
    }

    /// Enable or disable eviction logging.
    pub fn with_evictions(mut self, enabled: bool) -> Self {
        self.log_evictions = enabled;
        self
    }

    /// Enable or disable flush logging.
    pub fn with_flushes(mut self, enabled: bool) -> Self {
        self.log_flushes = enabled;
        self
    }
}

impl Default for LoggingExtension {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheExtension for LoggingExtension {
    async fn register(&self, _stack: Arc<CacheStack>) -> CacheResult<()> {
        tracing::debug!("logging extension registered");
        Ok(())
    }

    fn as_change_observer(&self) -> Option<&dyn CacheChangeObserver> {
        Some(self)
    }
}

#[async_trait]
impl CacheChangeObserver for LoggingExtension {
    async fn on_cache_update(
        &self,
        hash_key: &str,
        expiry: Option<DateTime<Utc>>,
        update: CacheUpdateType,
    ) -> CacheResult<()> {
        if self.log_updates {
            tracing::info!(hash_key, ?expiry, ?update, "cache entry updated");
        }
        Ok(())
    }

    async fn on_hash_element_update(
        &self,
        hash_key: &str,
        element_key: &str,
        expiry: Option<DateTime<Utc>>,
        update: CacheUpdateType,
    ) -> CacheResult<()> {
        if self.log_updates {
            tracing::info!(hash_key, element_key, ?expiry, ?update, "cache element updated");
        }
        Ok(())
    }

    async fn on_hash_subset_update(
        &self,
        hash_key: &str,
        element_keys: &[String],
        expiry: Option<DateTime<Utc>>,
        update: CacheUpdateType,
    ) -> CacheResult<()> {
        if self.log_updates {
            tracing::info!(
                hash_key,
                elements = element_keys.len(),
                ?expiry,
                ?update,
                "cache subset updated"
            );
        }
        Ok(())
    }

    async fn on_cache_eviction(&self, hash_key: &str) -> CacheResult<()> {
        if self.log_evictions {
            tracing::info!(hash_key, "cache entry evicted");
        }
        Ok(())
    }

    async fn on_hash_element_eviction(&self, hash_key: &str, element_key: &str) -> CacheResult<()> {
        if self.log_evictions {
            tracing::info!(hash_key, element_key, "cache element evicted");
        }
        Ok(())
    }

    async fn on_hash_subset_eviction(
        &self,
        hash_key: &str,
        element_keys: &[String],
    ) -> CacheResult<()> {
        if self.log_evictions {
            tracing::info!(hash_key, elements = element_keys.len(), "cache subset evicted");
        }
        Ok(())
    }

    async fn on_cache_flush(&self) -> CacheResult<()> {
        if self.log_flushes {
            tracing::info!("cache flushed across all layers");
        }
        Ok(())
    }
}
