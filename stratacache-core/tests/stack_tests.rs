//! Integration tests for the cache stack's read, write, back-population
//! and disposal behaviour over in-memory layers.

mod common;

use chrono::{Duration, SubsecRound, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use common::{encode, keys, RecordingLayer};
use stratacache_core::clock::{Clock, ManualClock};
use stratacache_core::entry::CacheSetEntry;
use stratacache_core::error::CacheError;
use stratacache_core::layer::CacheLayer;
use stratacache_core::memory::MemoryCacheLayer;
use stratacache_core::stack::{CacheStack, FlushableCacheStack};

fn far_expiry() -> chrono::DateTime<Utc> {
    Utc::now() + Duration::hours(1)
}

#[tokio::test]
async fn set_then_get_returns_what_was_set() {
    let stack = CacheStack::builder()
        .layer(Arc::new(MemoryCacheLayer::new()))
        .build()
        .await
        .unwrap();

    let elements = HashMap::from([("a".to_string(), 1u64), ("b".to_string(), 2u64)]);
    stack.set_hash("k", &elements, far_expiry()).await.unwrap();

    assert_eq!(stack.get_value::<u64>("k", "a").await.unwrap(), Some(1));
    assert_eq!(stack.get_value::<u64>("k", "b").await.unwrap(), Some(2));
    assert_eq!(stack.get_value::<u64>("k", "missing").await.unwrap(), None);
}

#[tokio::test]
async fn get_hash_returns_the_retrieved_entry() {
    let stack = CacheStack::builder()
        .layer(Arc::new(MemoryCacheLayer::new()))
        .build()
        .await
        .unwrap();

    let expiry = far_expiry();
    let elements = HashMap::from([("a".to_string(), 1u64), ("b".to_string(), 2u64)]);
    stack.set_hash("k", &elements, expiry).await.unwrap();

    let set = stack.get_hash::<u64>("k").await.unwrap().unwrap();
    assert_eq!(set.elements, elements);
    assert_eq!(set.expiry, Some(expiry.trunc_subsecs(0)));
    assert_eq!(set.entry("a").value, Some(1));
}

#[tokio::test]
async fn set_then_evict_then_get_returns_absent() {
    let stack = CacheStack::builder()
        .layer(Arc::new(MemoryCacheLayer::new()))
        .build()
        .await
        .unwrap();

    let elements = HashMap::from([("a".to_string(), 1u64)]);
    stack.set_hash("k", &elements, far_expiry()).await.unwrap();

    stack.evict_value("k", "a").await.unwrap();
    assert_eq!(stack.get_value::<u64>("k", "a").await.unwrap(), None);

    stack.set_hash("k", &elements, far_expiry()).await.unwrap();
    stack.evict_hash("k").await.unwrap();
    assert!(stack.get_hash::<u64>("k").await.unwrap().is_none());
}

#[tokio::test]
async fn deep_hit_back_populates_every_closer_layer() {
    let near = Arc::new(MemoryCacheLayer::new());
    let mid = Arc::new(MemoryCacheLayer::new());
    let far = Arc::new(MemoryCacheLayer::new());
    let stack = CacheStack::builder()
        .layer(near.clone())
        .layer(mid.clone())
        .layer(far.clone())
        .build()
        .await
        .unwrap();

    far.set_hash(
        "k",
        &CacheSetEntry::with_elements(
            [("a".to_string(), encode(&1u64))],
            Some(far_expiry()),
        ),
    )
    .await
    .unwrap();

    assert_eq!(stack.get_value::<u64>("k", "a").await.unwrap(), Some(1));

    assert_eq!(near.get_value("k", "a").await.unwrap(), Some(encode(&1u64)));
    assert_eq!(mid.get_value("k", "a").await.unwrap(), Some(encode(&1u64)));
}

#[tokio::test]
async fn writes_reach_every_layer_before_returning() {
    let near = Arc::new(RecordingLayer::new());
    let far = Arc::new(RecordingLayer::new());
    let stack = CacheStack::builder()
        .layer(near.clone())
        .layer(far.clone())
        .build()
        .await
        .unwrap();

    let elements = HashMap::from([("a".to_string(), 1u64)]);
    stack.set_hash("k", &elements, far_expiry()).await.unwrap();
    stack.set_value("k", "b", &2u64).await.unwrap();

    for layer in [&near, &far] {
        let log = layer.write_log();
        assert!(log.contains(&"set_hash:k".to_string()));
        assert!(log.contains(&"set_value:k:b".to_string()));
    }
}

#[tokio::test]
async fn single_layer_stack_never_back_populates() {
    let only = Arc::new(RecordingLayer::new());
    let stack = CacheStack::builder().layer(only.clone()).build().await.unwrap();

    let elements = HashMap::from([("a".to_string(), 1u64)]);
    stack.set_hash("k", &elements, far_expiry()).await.unwrap();
    let writes_after_set = only.write_log().len();

    assert_eq!(stack.get_value::<u64>("k", "a").await.unwrap(), Some(1));
    assert!(stack.get_hash::<u64>("k").await.unwrap().is_some());
    stack.get_hash_subset::<u64>("k", &keys(&["a"])).await.unwrap();

    assert_eq!(only.write_log().len(), writes_after_set);
}

#[tokio::test]
async fn unavailable_layer_is_skipped_on_reads_and_back_population() {
    common::init_tracing();
    let near = Arc::new(RecordingLayer::new());
    let far = Arc::new(RecordingLayer::new());
    let stack = CacheStack::builder()
        .layer(near.clone())
        .layer(far.clone())
        .build()
        .await
        .unwrap();

    far.set_hash(
        "k",
        &CacheSetEntry::with_elements([("a".to_string(), encode(&1u64))], Some(far_expiry())),
    )
    .await
    .unwrap();

    near.set_available(false);
    assert_eq!(stack.get_value::<u64>("k", "a").await.unwrap(), Some(1));

    // The unavailable layer saw no back-population.
    near.set_available(true);
    assert_eq!(near.get_value("k", "a").await.unwrap(), None);
}

#[tokio::test]
async fn subset_read_returns_requested_intersection() {
    let stack = CacheStack::builder()
        .layer(Arc::new(MemoryCacheLayer::new()))
        .build()
        .await
        .unwrap();

    let elements = HashMap::from([
        ("1".to_string(), "x".to_string()),
        ("2".to_string(), "y".to_string()),
        ("3".to_string(), "z".to_string()),
    ]);
    stack.set_hash_subset("k", &elements).await.unwrap();

    let result = stack
        .get_hash_subset::<String>("k", &keys(&["1", "4"]))
        .await
        .unwrap();
    assert_eq!(result, HashMap::from([("1".to_string(), "x".to_string())]));
}

#[tokio::test]
async fn subset_read_accumulates_partial_hits_across_layers() {
    let near = Arc::new(MemoryCacheLayer::new());
    let far = Arc::new(MemoryCacheLayer::new());
    let stack = CacheStack::builder()
        .layer(near.clone())
        .layer(far.clone())
        .build()
        .await
        .unwrap();

    near.set_hash(
        "k",
        &CacheSetEntry::with_elements([("1".to_string(), encode(&"x"))], None),
    )
    .await
    .unwrap();
    far.set_hash(
        "k",
        &CacheSetEntry::with_elements(
            [
                ("1".to_string(), encode(&"x")),
                ("2".to_string(), encode(&"y")),
                ("3".to_string(), encode(&"z")),
            ],
            Some(far_expiry()),
        ),
    )
    .await
    .unwrap();

    let result = stack
        .get_hash_subset::<String>("k", &keys(&["1", "2", "4"]))
        .await
        .unwrap();
    assert_eq!(
        result,
        HashMap::from([
            ("1".to_string(), "x".to_string()),
            ("2".to_string(), "y".to_string()),
        ])
    );

    // The deeper layer's contribution was back-populated into the nearer
    // layer for the requested keys.
    assert_eq!(near.get_value("k", "2").await.unwrap(), Some(encode(&"y")));
    assert_eq!(near.get_value("k", "4").await.unwrap(), None);
}

#[tokio::test]
async fn subset_read_short_circuits_on_single_layer_full_hit() {
    let near = Arc::new(MemoryCacheLayer::new());
    let far = Arc::new(MemoryCacheLayer::new());
    let stack = CacheStack::builder()
        .layer(near.clone())
        .layer(far.clone())
        .build()
        .await
        .unwrap();

    // The near layer knows the key but holds none of the requested
    // elements; the far layer satisfies the whole request.
    near.set_hash(
        "k",
        &CacheSetEntry::with_elements([("other".to_string(), encode(&"o"))], None),
    )
    .await
    .unwrap();
    far.set_hash(
        "k",
        &CacheSetEntry::with_elements(
            [
                ("2".to_string(), encode(&"y")),
                ("3".to_string(), encode(&"z")),
            ],
            Some(far_expiry()),
        ),
    )
    .await
    .unwrap();

    let result = stack
        .get_hash_subset::<String>("k", &keys(&["2", "3"]))
        .await
        .unwrap();
    assert_eq!(result.len(), 2);

    // Back-population happened before the short-circuit return.
    assert_eq!(near.get_value("k", "2").await.unwrap(), Some(encode(&"y")));
    assert_eq!(near.get_value("k", "3").await.unwrap(), Some(encode(&"z")));
}

#[tokio::test]
async fn empty_subset_request_returns_empty_dictionary() {
    let stack = CacheStack::builder()
        .layer(Arc::new(MemoryCacheLayer::new()))
        .build()
        .await
        .unwrap();

    let result = stack.get_hash_subset::<u64>("k", &[]).await.unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn entries_expire_across_the_stack() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let near = Arc::new(MemoryCacheLayer::with_clock(clock.clone()));
    let far = Arc::new(MemoryCacheLayer::with_clock(clock.clone()));
    let stack = CacheStack::builder()
        .layer(near)
        .layer(far)
        .build()
        .await
        .unwrap();

    let elements = HashMap::from([("500".to_string(), 500u64)]);
    stack
        .set_hash("k", &elements, clock.now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(stack.get_value::<u64>("k", "500").await.unwrap(), Some(500));

    clock.advance(Duration::seconds(1));
    assert!(stack.get_hash::<u64>("k").await.unwrap().is_none());
    assert_eq!(stack.get_value::<u64>("k", "500").await.unwrap(), None);
}

#[tokio::test]
async fn set_hash_expiry_replaces_the_stored_expiry() {
    let stack = CacheStack::builder()
        .layer(Arc::new(MemoryCacheLayer::new()))
        .build()
        .await
        .unwrap();

    let elements = HashMap::from([("a".to_string(), 1u64)]);
    stack.set_hash("k", &elements, far_expiry()).await.unwrap();

    let new_expiry = Utc::now() + Duration::hours(6);
    stack.set_hash_expiry("k", new_expiry).await.unwrap();

    let set = stack.get_hash::<u64>("k").await.unwrap().unwrap();
    assert_eq!(set.expiry, Some(new_expiry.trunc_subsecs(0)));
}

#[tokio::test]
async fn flush_clears_every_layer() {
    let near = Arc::new(MemoryCacheLayer::new());
    let far = Arc::new(MemoryCacheLayer::new());
    let stack = CacheStack::builder()
        .layer(near.clone())
        .layer(far.clone())
        .build()
        .await
        .unwrap();

    let elements = HashMap::from([("a".to_string(), 1u64)]);
    stack.set_hash("k", &elements, far_expiry()).await.unwrap();

    stack.flush().await.unwrap();

    assert!(stack.get_hash::<u64>("k").await.unwrap().is_none());
    assert!(near.get_hash("k").await.unwrap().is_none());
    assert!(far.get_hash("k").await.unwrap().is_none());
}

#[tokio::test]
async fn builder_rejects_empty_layer_array() {
    let result = CacheStack::builder().build().await;
    assert!(matches!(result, Err(CacheError::Usage { .. })));
}

#[tokio::test]
async fn empty_keys_are_usage_errors() {
    let stack = CacheStack::builder()
        .layer(Arc::new(MemoryCacheLayer::new()))
        .build()
        .await
        .unwrap();

    assert!(matches!(
        stack.get_value::<u64>("", "a").await,
        Err(CacheError::Usage { .. })
    ));
    assert!(matches!(
        stack.get_value::<u64>("k", "").await,
        Err(CacheError::Usage { .. })
    ));
    assert!(matches!(
        stack.evict_hash("").await,
        Err(CacheError::Usage { .. })
    ));
}

#[tokio::test]
async fn disposed_stack_rejects_operations() {
    let stack = CacheStack::builder()
        .layer(Arc::new(MemoryCacheLayer::new()))
        .build()
        .await
        .unwrap();

    stack.dispose().await.unwrap();
    // Disposal is idempotent.
    stack.dispose().await.unwrap();

    assert!(matches!(
        stack.get_value::<u64>("k", "a").await,
        Err(CacheError::Disposed)
    ));
    assert!(matches!(
        stack.set_value("k", "a", &1u64).await,
        Err(CacheError::Disposed)
    ));
    assert!(matches!(stack.cleanup().await, Err(CacheError::Disposed)));
    assert!(matches!(stack.flush().await, Err(CacheError::Disposed)));
}
