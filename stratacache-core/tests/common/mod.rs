#![allow(dead_code)]

//! Shared helpers for the integration suites: an instrumented layer that
//! records writes and can be toggled unavailable, plus encoding shortcuts
//! matching the stack's default JSON codec.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use stratacache_core::entry::{CacheSetEntry, RawValue};
use stratacache_core::error::CacheResult;
use stratacache_core::layer::CacheLayer;
use stratacache_core::memory::MemoryCacheLayer;

/// Route tracing output through the test harness capture. Only the first
/// call installs the subscriber; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Encode a value the way the stack's default codec does.
pub fn encode<T: Serialize>(value: &T) -> RawValue {
    serde_json::to_vec(value).unwrap()
}

/// A memory layer that records write operations and whose availability can
/// be toggled from tests.
pub struct RecordingLayer {
    inner: MemoryCacheLayer,
    writes: Mutex<Vec<String>>,
    available: AtomicBool,
}

impl RecordingLayer {
    pub fn new() -> Self {
        Self {
            inner: MemoryCacheLayer::new(),
            writes: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn write_log(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn record(&self, operation: String) {
        self.writes.lock().unwrap().push(operation);
    }
}

#[async_trait]
impl CacheLayer for RecordingLayer {
    async fn get_value(&self, hash_key: &str, element_key: &str) -> CacheResult<Option<RawValue>> {
        self.inner.get_value(hash_key, element_key).await
    }

    async fn set_value(
        &self,
        hash_key: &str,
        element_key: &str,
        value: RawValue,
    ) -> CacheResult<()> {
        self.record(format!("set_value:{hash_key}:{element_key}"));
        self.inner.set_value(hash_key, element_key, value).await
    }

    async fn evict_value(&self, hash_key: &str, element_key: &str) -> CacheResult<()> {
        self.record(format!("evict_value:{hash_key}:{element_key}"));
        self.inner.evict_value(hash_key, element_key).await
    }

    async fn get_hash(&self, hash_key: &str) -> CacheResult<Option<CacheSetEntry>> {
        self.inner.get_hash(hash_key).await
    }

    async fn set_hash(&self, hash_key: &str, entry: &CacheSetEntry) -> CacheResult<()> {
        self.record(format!("set_hash:{hash_key}"));
        self.inner.set_hash(hash_key, entry).await
    }

    async fn evict_hash(&self, hash_key: &str) -> CacheResult<()> {
        self.record(format!("evict_hash:{hash_key}"));
        self.inner.evict_hash(hash_key).await
    }

    async fn get_hash_subset(
        &self,
        hash_key: &str,
        element_keys: &[String],
    ) -> CacheResult<Option<HashMap<String, RawValue>>> {
        self.inner.get_hash_subset(hash_key, element_keys).await
    }

    async fn set_hash_subset(
        &self,
        hash_key: &str,
        subset: &HashMap<String, RawValue>,
    ) -> CacheResult<()> {
        let mut element_keys: Vec<&str> = subset.keys().map(String::as_str).collect();
        element_keys.sort_unstable();
        self.record(format!("set_hash_subset:{hash_key}:{}", element_keys.join(",")));
        self.inner.set_hash_subset(hash_key, subset).await
    }

    async fn evict_hash_subset(&self, hash_key: &str, element_keys: &[String]) -> CacheResult<()> {
        self.record(format!("evict_hash_subset:{hash_key}"));
        self.inner.evict_hash_subset(hash_key, element_keys).await
    }

    async fn set_hash_expiry(&self, hash_key: &str, expiry: DateTime<Utc>) -> CacheResult<()> {
        self.record(format!("set_hash_expiry:{hash_key}"));
        self.inner.set_hash_expiry(hash_key, expiry).await
    }

    async fn cleanup(&self) -> CacheResult<()> {
        self.inner.cleanup().await
    }

    async fn flush(&self) -> CacheResult<()> {
        self.record("flush".to_string());
        self.inner.flush().await
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

/// Convenience constructor for string element keys.
pub fn keys(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
