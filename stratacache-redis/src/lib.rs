//! # Stratacache Redis
//!
//! The network-backed tier of a stratacache stack plus the pub/sub
//! extension that keeps peer processes coherent.
//!
//! ## Overview
//!
//! - [`RedisCacheLayer`]: a [`CacheLayer`] persisting each logical hash
//!   entry as two correlated Redis records — `K:hash` holding the element
//!   fields and `K:info` holding the encoded expiry metadata — written and
//!   read under transactional batches.
//! - [`RedisRemoteEvictionExtension`]: a change observer that broadcasts
//!   update/eviction/flush events over Redis pub/sub and applies peer
//!   events to designated local layers, suppressing its own echoes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stratacache_core::memory::MemoryCacheLayer;
//! use stratacache_core::stack::CacheStack;
//! use stratacache_redis::{
//!     RedisCacheLayer, RedisRemoteEvictionExtension, RemoteEvictionConfig,
//! };
//!
//! let client = redis::Client::open("redis://127.0.0.1:6379/0")?;
//! let memory = Arc::new(MemoryCacheLayer::new());
//! let remote = Arc::new(RedisCacheLayer::connect(&client).await?);
//!
//! let coherence = Arc::new(RedisRemoteEvictionExtension::new(
//!     client,
//!     RemoteEvictionConfig::default(),
//!     vec![memory.clone()],
//! ));
//!
//! let stack = CacheStack::builder()
//!     .layer(memory)
//!     .layer(remote)
//!     .extension(coherence)
//!     .build()
//!     .await?;
//! ```
//!
//! [`CacheLayer`]: stratacache_core::layer::CacheLayer

use stratacache_core::error::CacheError;

pub mod eviction;
pub mod layer;
pub mod message;

pub use eviction::{RedisRemoteEvictionExtension, RemoteEvictionConfig};
pub use layer::RedisCacheLayer;
pub use message::HashKeyEvictionMessage;

/// Map a connection-level Redis failure into the shared error type.
pub(crate) fn connection_error(error: redis::RedisError) -> CacheError {
    CacheError::RemoteUnavailable {
        message: error.to_string(),
    }
}

/// Map a failed transactional batch into the shared error type.
pub(crate) fn transaction_error(error: redis::RedisError) -> CacheError {
    CacheError::RemoteTransaction {
        message: error.to_string(),
    }
}
