//! # Redis Cache Layer Module
//!
//! The shared, network-backed tier of a cache stack.
//!
//! ## Storage model
//!
//! For a logical hash-table key `K` the layer persists two physical
//! records:
//!
//! - `K:hash` — a Redis hash of element-key → encoded value.
//! - `K:info` — an encoded metadata record holding the logical expiry.
//!
//! Both records carry the same Redis TTL. Full-hash writes, whole-hash
//! evictions and expiry updates are transactional (`MULTI`/`EXEC`), so a
//! concurrent reader observes either both records or neither.
//!
//! ## TTL semantics
//!
//! A full-hash write whose expiry is already in the past is a no-op.
//! Per-element writes never touch the TTL; the TTL attached by the last
//! full-hash write governs the whole structure, and a bare element write
//! to a fresh key creates a structure with no TTL at all.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use stratacache_core::clock::{Clock, SystemClock};
use stratacache_core::codec::{decode_value, encode_value, CacheCodec, JsonCodec};
use stratacache_core::entry::{CacheSetEntry, RawValue};
use stratacache_core::error::CacheResult;
use stratacache_core::layer::CacheLayer;

use crate::{connection_error, transaction_error};

/// Metadata record stored beside each hash structure.
#[derive(Debug, Serialize, Deserialize)]
struct HashEntryInfo {
    expiry: Option<DateTime<Utc>>,
}

/// Network-backed cache layer persisting hash entries in Redis.
pub struct RedisCacheLayer {
    connection: MultiplexedConnection,
    codec: Arc<dyn CacheCodec>,
    clock: Arc<dyn Clock>,
}

impl RedisCacheLayer {
    /// Connect with the default JSON codec and system clock.
    pub async fn connect(client: &redis::Client) -> CacheResult<Self> {
        Self::connect_with(client, Arc::new(JsonCodec), Arc::new(SystemClock)).await
    }

    /// Connect with an injected codec and clock.
    pub async fn connect_with(
        client: &redis::Client,
        codec: Arc<dyn CacheCodec>,
        clock: Arc<dyn Clock>,
    ) -> CacheResult<Self> {
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(connection_error)?;
        tracing::info!("redis cache layer connected");
        Ok(Self {
            connection,
            codec,
            clock,
        })
    }

    fn data_key(hash_key: &str) -> String {
        format!("{hash_key}:hash")
    }

    fn info_key(hash_key: &str) -> String {
        format!("{hash_key}:info")
    }

    fn encode_info(&self, expiry: Option<DateTime<Utc>>) -> CacheResult<RawValue> {
        encode_value(self.codec.as_ref(), &HashEntryInfo { expiry })
    }

    fn decode_info(&self, bytes: &[u8]) -> CacheResult<Option<DateTime<Utc>>> {
        let info: HashEntryInfo = decode_value(self.codec.as_ref(), bytes)?;
        Ok(info.expiry)
    }
}

#[async_trait]
impl CacheLayer for RedisCacheLayer {
    async fn get_value(&self, hash_key: &str, element_key: &str) -> CacheResult<Option<RawValue>> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = redis::cmd("HGET")
            .arg(Self::data_key(hash_key))
            .arg(element_key)
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;
        Ok(value)
    }

    async fn set_value(
        &self,
        hash_key: &str,
        element_key: &str,
        value: RawValue,
    ) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("HSET")
            .arg(Self::data_key(hash_key))
            .arg(element_key)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;
        Ok(())
    }

    async fn evict_value(&self, hash_key: &str, element_key: &str) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("HDEL")
            .arg(Self::data_key(hash_key))
            .arg(element_key)
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;
        Ok(())
    }

    async fn get_hash(&self, hash_key: &str) -> CacheResult<Option<CacheSetEntry>> {
        let mut conn = self.connection.clone();
        let (fields, info): (HashMap<String, Vec<u8>>, Option<Vec<u8>>) = redis::pipe()
            .atomic()
            .cmd("HGETALL")
            .arg(Self::data_key(hash_key))
            .cmd("GET")
            .arg(Self::info_key(hash_key))
            .query_async(&mut conn)
            .await
            .map_err(transaction_error)?;

        if fields.is_empty() {
            return Ok(None);
        }
        let expiry = match info {
            Some(bytes) => self.decode_info(&bytes)?,
            None => None,
        };
        Ok(Some(CacheSetEntry::with_elements(fields, expiry)))
    }

    async fn set_hash(&self, hash_key: &str, entry: &CacheSetEntry) -> CacheResult<()> {
        let Some(expiry) = entry.expiry() else {
            // Without an expiry there is no TTL to attach; nothing to
            // persist at this tier.
            return Ok(());
        };
        let offset = (expiry - self.clock.now()).num_seconds();
        if offset <= 0 {
            tracing::debug!(hash_key, "skipping write of already-expired hash entry");
            return Ok(());
        }

        let info = self.encode_info(Some(expiry))?;
        let fields = entry.snapshot();

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("DEL").arg(hash_key).ignore();
        pipe.cmd("SETEX")
            .arg(Self::info_key(hash_key))
            .arg(offset)
            .arg(info)
            .ignore();
        if !fields.is_empty() {
            let hset = pipe.cmd("HSET").arg(Self::data_key(hash_key));
            for (element_key, value) in fields {
                hset.arg(element_key).arg(value);
            }
            hset.ignore();
        }
        pipe.cmd("EXPIRE")
            .arg(Self::data_key(hash_key))
            .arg(offset)
            .ignore();

        let mut conn = self.connection.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(transaction_error)?;
        Ok(())
    }

    async fn evict_hash(&self, hash_key: &str) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(Self::data_key(hash_key))
            .ignore()
            .cmd("DEL")
            .arg(Self::info_key(hash_key))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(transaction_error)?;
        Ok(())
    }

    async fn get_hash_subset(
        &self,
        hash_key: &str,
        element_keys: &[String],
    ) -> CacheResult<Option<HashMap<String, RawValue>>> {
        let mut conn = self.connection.clone();
        if element_keys.is_empty() {
            let exists: bool = redis::cmd("EXISTS")
                .arg(Self::data_key(hash_key))
                .query_async(&mut conn)
                .await
                .map_err(connection_error)?;
            return Ok(exists.then(HashMap::new));
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("EXISTS").arg(Self::data_key(hash_key));
        let hmget = pipe.cmd("HMGET").arg(Self::data_key(hash_key));
        for element_key in element_keys {
            hmget.arg(element_key);
        }

        let (exists, values): (bool, Vec<Option<Vec<u8>>>) = pipe
            .query_async(&mut conn)
            .await
            .map_err(transaction_error)?;
        if !exists {
            return Ok(None);
        }

        let subset = element_keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key.clone(), v)))
            .collect();
        Ok(Some(subset))
    }

    async fn set_hash_subset(
        &self,
        hash_key: &str,
        subset: &HashMap<String, RawValue>,
    ) -> CacheResult<()> {
        if subset.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        let hset = pipe.cmd("HSET").arg(Self::data_key(hash_key));
        for (element_key, value) in subset {
            hset.arg(element_key).arg(value.as_slice());
        }
        hset.ignore();

        let mut conn = self.connection.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(transaction_error)?;
        Ok(())
    }

    async fn evict_hash_subset(&self, hash_key: &str, element_keys: &[String]) -> CacheResult<()> {
        if element_keys.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        let hdel = pipe.cmd("HDEL").arg(Self::data_key(hash_key));
        for element_key in element_keys {
            hdel.arg(element_key);
        }
        hdel.ignore();

        let mut conn = self.connection.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(transaction_error)?;
        Ok(())
    }

    async fn set_hash_expiry(&self, hash_key: &str, expiry: DateTime<Utc>) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(Self::data_key(hash_key))
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;
        if !exists {
            return Ok(());
        }

        let expiry = expiry.trunc_subsecs(0);
        let offset = (expiry - self.clock.now()).num_seconds().max(0);
        let info = self.encode_info(Some(expiry))?;

        // EXPIRE with a non-positive offset deletes the key, which matches
        // the already-expired contract.
        let _: () = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(Self::info_key(hash_key))
            .arg(info)
            .ignore()
            .cmd("EXPIRE")
            .arg(Self::info_key(hash_key))
            .arg(offset)
            .ignore()
            .cmd("EXPIRE")
            .arg(Self::data_key(hash_key))
            .arg(offset)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(transaction_error)?;
        Ok(())
    }

    async fn cleanup(&self) -> CacheResult<()> {
        // Redis expires keys on its own.
        Ok(())
    }

    async fn flush(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;
        Ok(())
    }

    async fn is_available(&self) -> bool {
        let mut conn = self.connection.clone();
        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(response) => response == "PONG",
            Err(error) => {
                tracing::warn!(error = %error, "redis cache layer is unavailable");
                false
            }
        }
    }
}
