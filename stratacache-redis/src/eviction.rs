//! # Remote Eviction Extension Module
//!
//! Keeps the local layers of a fleet of processes coherent: every mutation
//! observed on the owning stack is broadcast over Redis pub/sub, and
//! messages arriving from peers are applied to designated local layers.
//!
//! ## Channels
//!
//! Three channels are derived from a configurable prefix:
//!
//! - `<prefix>.RemoteEviction` — payload is the affected cache key.
//! - `<prefix>.RemoteFlush` — empty payload.
//! - `<prefix>.RemoteHashKeyEviction` — encoded
//!   [`HashKeyEvictionMessage`].
//!
//! ## Echo suppression
//!
//! Before publishing, the extension records the key or message in a flag
//! set guarded by a mutex. When a message arrives, a successful removal
//! from the flag set identifies it as our own echo and it is dropped;
//! anything else came from a peer and is applied. Flags are strictly
//! one-shot per publish.
//!
//! This scheme assumes the broker delivers a self-publish back to the
//! publisher after the flag was inserted, which holds for Redis pub/sub in
//! practice but is not a guarantee; a stale flag lingers until the same
//! key is published again.
//!
//! Publishes are fire-and-forget: a failed publish is logged and coherence
//! degrades to the underlying store's TTL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use stratacache_core::codec::{decode_value, encode_value, CacheCodec, JsonCodec};
use stratacache_core::entry::CacheUpdateType;
use stratacache_core::error::{CacheError, CacheResult};
use stratacache_core::extensions::{CacheChangeObserver, CacheExtension};
use stratacache_core::layer::CacheLayer;
use stratacache_core::stack::CacheStack;

use crate::connection_error;
use crate::message::HashKeyEvictionMessage;

fn default_channel_prefix() -> String {
    "stratacache".to_string()
}

/// Configuration for the remote-eviction extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEvictionConfig {
    /// Prefix the three pub/sub channel names are derived from.
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
}

impl RemoteEvictionConfig {
    /// Configuration with a custom channel prefix.
    pub fn new(channel_prefix: impl Into<String>) -> Self {
        Self {
            channel_prefix: channel_prefix.into(),
        }
    }
}

impl Default for RemoteEvictionConfig {
    fn default() -> Self {
        Self {
            channel_prefix: default_channel_prefix(),
        }
    }
}

#[derive(Debug, Clone)]
struct ChannelNames {
    eviction: String,
    flush: String,
    hash_eviction: String,
}

impl ChannelNames {
    fn from_prefix(prefix: &str) -> Self {
        Self {
            eviction: format!("{prefix}.RemoteEviction"),
            flush: format!("{prefix}.RemoteFlush"),
            hash_eviction: format!("{prefix}.RemoteHashKeyEviction"),
        }
    }
}

/// Self-published events awaiting their echo. Guarded by one mutex, held
/// only for the insert/remove and the flush flag read-clear.
#[derive(Debug, Default)]
struct FlagState {
    flagged_evictions: HashSet<String>,
    flagged_eviction_messages: HashSet<HashKeyEvictionMessage>,
    has_flush_triggered: bool,
}

/// State shared between the observer side and the listener task.
struct EvictionState {
    channels: ChannelNames,
    layers: Vec<Arc<dyn CacheLayer>>,
    codec: Arc<dyn CacheCodec>,
    flags: Mutex<FlagState>,
}

impl EvictionState {
    fn flag_eviction(&self, hash_key: &str) {
        self.flags
            .lock()
            .unwrap()
            .flagged_evictions
            .insert(hash_key.to_string());
    }

    fn try_consume_eviction(&self, hash_key: &str) -> bool {
        self.flags.lock().unwrap().flagged_evictions.remove(hash_key)
    }

    fn flag_message(&self, message: HashKeyEvictionMessage) {
        self.flags
            .lock()
            .unwrap()
            .flagged_eviction_messages
            .insert(message);
    }

    fn try_consume_message(&self, message: &HashKeyEvictionMessage) -> bool {
        self.flags
            .lock()
            .unwrap()
            .flagged_eviction_messages
            .remove(message)
    }

    fn flag_flush(&self) {
        self.flags.lock().unwrap().has_flush_triggered = true;
    }

    fn try_consume_flush(&self) -> bool {
        std::mem::take(&mut self.flags.lock().unwrap().has_flush_triggered)
    }

    async fn receive_eviction(&self, hash_key: &str) {
        if self.try_consume_eviction(hash_key) {
            tracing::debug!(hash_key, "suppressed self-published eviction");
            return;
        }
        for layer in &self.layers {
            if let Err(error) = layer.evict_hash(hash_key).await {
                tracing::warn!(error = %error, hash_key, "failed to apply peer eviction");
            }
        }
    }

    async fn receive_hash_eviction(&self, message: &HashKeyEvictionMessage) {
        if self.try_consume_message(message) {
            tracing::debug!(
                hash_key = %message.hash_key,
                "suppressed self-published hash-key eviction"
            );
            return;
        }
        for layer in &self.layers {
            if let Err(error) = layer
                .evict_hash_subset(&message.hash_key, &message.element_keys)
                .await
            {
                tracing::warn!(
                    error = %error,
                    hash_key = %message.hash_key,
                    "failed to apply peer hash-key eviction"
                );
            }
        }
    }

    async fn receive_flush(&self) {
        if self.try_consume_flush() {
            tracing::debug!("suppressed self-published flush");
            return;
        }
        for layer in &self.layers {
            if let Err(error) = layer.flush().await {
                tracing::warn!(error = %error, "failed to apply peer flush");
            }
        }
    }

    async fn handle_message(&self, message: redis::Msg) {
        let channel = message.get_channel_name().to_string();
        if channel == self.channels.eviction {
            match message.get_payload::<String>() {
                Ok(hash_key) => self.receive_eviction(&hash_key).await,
                Err(error) => {
                    tracing::warn!(error = %error, %channel, "undecodable eviction payload");
                }
            }
        } else if channel == self.channels.hash_eviction {
            let payload = match message.get_payload::<Vec<u8>>() {
                Ok(payload) => payload,
                Err(error) => {
                    tracing::warn!(error = %error, %channel, "undecodable hash-key eviction payload");
                    return;
                }
            };
            match decode_value::<HashKeyEvictionMessage>(self.codec.as_ref(), &payload) {
                Ok(decoded) => self.receive_hash_eviction(&decoded).await,
                Err(error) => {
                    tracing::warn!(error = %error, %channel, "undecodable hash-key eviction payload");
                }
            }
        } else if channel == self.channels.flush {
            self.receive_flush().await;
        }
    }
}

/// Broadcasts stack mutations over Redis pub/sub and applies peer events
/// to designated local layers.
///
/// Binds to exactly one cache stack; registering a second time fails.
pub struct RedisRemoteEvictionExtension {
    client: redis::Client,
    state: Arc<EvictionState>,
    publisher: OnceLock<MultiplexedConnection>,
    token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
    registered: AtomicBool,
}

impl RedisRemoteEvictionExtension {
    /// Create the extension with the default JSON codec. `layers` are the
    /// local layers peer events are applied to, in order.
    pub fn new(
        client: redis::Client,
        config: RemoteEvictionConfig,
        layers: Vec<Arc<dyn CacheLayer>>,
    ) -> Self {
        Self::with_codec(client, config, layers, Arc::new(JsonCodec))
    }

    /// Create the extension with an injected codec for the hash-key
    /// eviction wire format.
    pub fn with_codec(
        client: redis::Client,
        config: RemoteEvictionConfig,
        layers: Vec<Arc<dyn CacheLayer>>,
        codec: Arc<dyn CacheCodec>,
    ) -> Self {
        Self {
            client,
            state: Arc::new(EvictionState {
                channels: ChannelNames::from_prefix(&config.channel_prefix),
                layers,
                codec,
                flags: Mutex::new(FlagState::default()),
            }),
            publisher: OnceLock::new(),
            token: CancellationToken::new(),
            listener: Mutex::new(None),
            registered: AtomicBool::new(false),
        }
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) {
        let Some(connection) = self.publisher.get() else {
            tracing::warn!(channel, "publish requested before registration");
            return;
        };
        let mut connection = connection.clone();
        if let Err(error) = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async::<_, ()>(&mut connection)
            .await
        {
            tracing::warn!(error = %error, channel, "failed to publish cache coherence message");
        }
    }

    async fn publish_hash_eviction(&self, message: HashKeyEvictionMessage) -> CacheResult<()> {
        let payload = encode_value(self.state.codec.as_ref(), &message)?;
        self.state.flag_message(message);
        self.publish(&self.state.channels.hash_eviction, payload)
            .await;
        Ok(())
    }

    async fn publish_eviction(&self, hash_key: &str) {
        self.state.flag_eviction(hash_key);
        self.publish(&self.state.channels.eviction, hash_key.as_bytes().to_vec())
            .await;
    }
}

#[async_trait]
impl CacheExtension for RedisRemoteEvictionExtension {
    async fn register(&self, _stack: Arc<CacheStack>) -> CacheResult<()> {
        if self.registered.swap(true, Ordering::SeqCst) {
            return Err(CacheError::usage(
                "remote eviction extension is already registered to a cache stack",
            ));
        }

        let publisher = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(connection_error)?;
        let _ = self.publisher.set(publisher);

        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(connection_error)?;
        pubsub
            .subscribe(self.state.channels.eviction.as_str())
            .await
            .map_err(connection_error)?;
        pubsub
            .subscribe(self.state.channels.flush.as_str())
            .await
            .map_err(connection_error)?;
        pubsub
            .subscribe(self.state.channels.hash_eviction.as_str())
            .await
            .map_err(connection_error)?;

        let state = Arc::clone(&self.state);
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            let mut pubsub = pubsub;
            let mut stream = pubsub.on_message();
            loop {
                tokio::select! {
                    message = stream.next() => {
                        match message {
                            Some(message) => state.handle_message(message).await,
                            None => break,
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
            tracing::debug!("remote eviction listener exited");
        });
        *self.listener.lock().unwrap() = Some(handle);

        tracing::info!(
            eviction = %self.state.channels.eviction,
            flush = %self.state.channels.flush,
            hash_eviction = %self.state.channels.hash_eviction,
            "remote eviction extension registered"
        );
        Ok(())
    }

    async fn dispose(&self) -> CacheResult<()> {
        self.token.cancel();
        let handle = self.listener.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        Ok(())
    }

    fn as_change_observer(&self) -> Option<&dyn CacheChangeObserver> {
        Some(self)
    }
}

#[async_trait]
impl CacheChangeObserver for RedisRemoteEvictionExtension {
    async fn on_cache_update(
        &self,
        hash_key: &str,
        _expiry: Option<DateTime<Utc>>,
        update: CacheUpdateType,
    ) -> CacheResult<()> {
        match update {
            CacheUpdateType::AddOrUpdate => {}
            _ => return Ok(()),
        }
        self.publish_eviction(hash_key).await;
        Ok(())
    }

    async fn on_hash_element_update(
        &self,
        hash_key: &str,
        element_key: &str,
        _expiry: Option<DateTime<Utc>>,
        update: CacheUpdateType,
    ) -> CacheResult<()> {
        match update {
            CacheUpdateType::AddOrUpdate => {}
            _ => return Ok(()),
        }
        self.publish_hash_eviction(HashKeyEvictionMessage::new(
            hash_key,
            vec![element_key.to_string()],
        ))
        .await
    }

    async fn on_hash_subset_update(
        &self,
        hash_key: &str,
        element_keys: &[String],
        _expiry: Option<DateTime<Utc>>,
        update: CacheUpdateType,
    ) -> CacheResult<()> {
        match update {
            CacheUpdateType::AddOrUpdate => {}
            _ => return Ok(()),
        }
        self.publish_hash_eviction(HashKeyEvictionMessage::new(hash_key, element_keys.to_vec()))
            .await
    }

    async fn on_cache_eviction(&self, hash_key: &str) -> CacheResult<()> {
        self.publish_eviction(hash_key).await;
        Ok(())
    }

    async fn on_hash_element_eviction(&self, hash_key: &str, element_key: &str) -> CacheResult<()> {
        self.publish_hash_eviction(HashKeyEvictionMessage::new(
            hash_key,
            vec![element_key.to_string()],
        ))
        .await
    }

    async fn on_hash_subset_eviction(
        &self,
        hash_key: &str,
        element_keys: &[String],
    ) -> CacheResult<()> {
        self.publish_hash_eviction(HashKeyEvictionMessage::new(hash_key, element_keys.to_vec()))
            .await
    }

    async fn on_cache_flush(&self) -> CacheResult<()> {
        self.state.flag_flush();
        self.publish(&self.state.channels.flush, Vec::new()).await;
        Ok(())
    }
}
