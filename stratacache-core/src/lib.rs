//! # Stratacache Core
//!
//! A multi-layer hierarchical caching library. An ordered stack of cache
//! layers (fast local → slower shared) sits behind a single
//! read-through/write-through facade exposing two flavours of cache
//! entity: single-value elements and hash-table entries — named
//! collections of element-key → value pairs sharing one expiry.
//!
//! ## Key Features
//!
//! - **Layered reads**: a read descends the layer array until a hit, then
//!   back-populates every skipped layer so the next read resolves at the
//!   front of the stack.
//! - **Write-through**: writes, evictions and flushes are applied to every
//!   layer in order before the call returns.
//! - **Partial hash reads**: subset reads accumulate partial hits across
//!   layers, asking each deeper layer only for the keys still missing.
//! - **Extension pipeline**: pluggable observers receive every mutation
//!   event in registration order — the hook remote-coherence integrations
//!   build on.
//! - **Background compaction**: an optional extension periodically drops
//!   expired entries from every layer.
//!
//! ## Architecture
//!
//! - [`entry`]: the data model — raw values, typed entries, hash entries.
//! - [`codec`]: the pluggable byte-level value codec.
//! - [`clock`]: the wall-clock abstraction expiry math runs on.
//! - [`layer`]: the storage capability every cache tier implements.
//! - [`memory`]: the in-process layer.
//! - [`stack`]: the read-through/write-through facade.
//! - [`extensions`]: the extension and change-observer pipeline.
//! - [`config`]: configuration structs and duration parsing.
//! - [`error`]: the shared error type.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use chrono::{Duration, Utc};
//! use stratacache_core::memory::MemoryCacheLayer;
//! use stratacache_core::stack::CacheStack;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stack = CacheStack::builder()
//!         .layer(Arc::new(MemoryCacheLayer::new()))
//!         .build()
//!         .await?;
//!
//!     let counts = HashMap::from([("home".to_string(), 42u64)]);
//!     stack.set_hash("views", &counts, Utc::now() + Duration::hours(1)).await?;
//!
//!     let hit: Option<u64> = stack.get_value("views", "home").await?;
//!     assert_eq!(hit, Some(42));
//!     Ok(())
//! }
//! ```
//!
//! A network-backed layer and the pub/sub remote-eviction extension that
//! keeps peer processes coherent live in the `stratacache-redis` crate.

pub mod clock;
pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod extensions;
pub mod layer;
pub mod memory;
pub mod stack;

pub use clock::{Clock, SystemClock};
pub use codec::{CacheCodec, JsonCodec};
pub use entry::{CacheEntry, CacheSet, CacheSetEntry, CacheUpdateType, RawValue};
pub use error::{CacheError, CacheResult};
pub use extensions::{
    AutoCleanupExtension, CacheChangeObserver, CacheExtension, LoggingExtension,
};
pub use layer::CacheLayer;
pub use memory::MemoryCacheLayer;
pub use stack::{CacheStack, CacheStackBuilder, FlushableCacheStack};
