//! Counter allocator against a real Redis server. Requires Docker:
//! `cargo test -p burrow-storage -- --ignored`.

use std::collections::HashMap;

use burrow_core::{ShortenRequest, Store, StoreError};
use burrow_storage::{open_store, BackendKind, CounterStore, RedisCounterBackend, StoreConfig};
use burrow_test_infra::redis::RedisMaster;
use redis::AsyncCommands;

fn request(url: &str) -> ShortenRequest {
    ShortenRequest::new(url, "192.0.2.7").unwrap()
}

async fn start_store(redis: &RedisMaster) -> CounterStore<RedisCounterBackend> {
    let uri = redis.uri(0).await.expect("Failed to build Redis URI");
    let backend = RedisCounterBackend::connect(&uri)
        .await
        .expect("Failed to connect to Redis");
    CounterStore::new(backend)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_store_writes_the_expected_keys() {
    let redis = RedisMaster::new().await.expect("Failed to start Redis");
    let store = start_store(&redis).await;

    let record = store.store(request("http://example.com/a")).await.unwrap();
    assert_eq!(record.id.as_str(), "0I5ItzlwZ");

    let mut conn = redis.connection().await.unwrap();
    let count: i64 = conn.get("burrow:bket:0I5Itzlw:urlcount").await.unwrap();
    assert_eq!(count, 1);

    let index: String = conn
        .get("burrow:bket:0I5Itzlw:urlid:http://example.com/a")
        .await
        .unwrap();
    assert_eq!(index, "0I5ItzlwZ");

    let hash: HashMap<String, String> = conn.hgetall("burrow:id:0I5ItzlwZ").await.unwrap();
    assert_eq!(hash["url"], "http://example.com/a");
    assert_eq!(hash["creator_ip"], "192.0.2.7");
    assert_eq!(hash["date_added"], record.date_added.to_string());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_store_fetch_and_visits() {
    let redis = RedisMaster::new().await.expect("Failed to start Redis");
    let store = start_store(&redis).await;

    let stored = store.store(request("http://example.com/a")).await.unwrap();
    assert_eq!(store.store(request("http://example.com/a")).await.unwrap(), stored);

    for _ in 0..3 {
        store.record_visit(&stored).await.unwrap();
    }

    let fetched = store.fetch(stored.id.as_str()).await.unwrap();
    assert_eq!(fetched.url, "http://example.com/a");
    assert_eq!(fetched.date_added, stored.date_added);
    assert_eq!(fetched.visits, 3);

    let mut conn = redis.connection().await.unwrap();
    let visits: i64 = conn.get("burrow:visits:0I5ItzlwZ").await.unwrap();
    assert_eq!(visits, 3);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_fetch_unknown_id() {
    let redis = RedisMaster::new().await.expect("Failed to start Redis");
    let store = start_store(&redis).await;

    assert_eq!(
        store.fetch("nonexistent-id").await.unwrap_err(),
        StoreError::NotFound("nonexistent-id".to_string())
    );
    assert_eq!(store.fetch_url("nonexistent-id").await, "");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_open_store_with_redis_uri() {
    let redis = RedisMaster::new().await.expect("Failed to start Redis");
    let config = StoreConfig::builder()
        .backend(BackendKind::Redis)
        .location(redis.uri(1).await.unwrap())
        .build();

    let store = open_store(&config).await.unwrap();
    let record = store.store(request("https://www.rust-lang.org/")).await.unwrap();
    assert_eq!(record.id.as_str(), "RHTxyKSwZ");

    store.close().await.unwrap();
    assert_eq!(
        store.fetch(record.id.as_str()).await.unwrap_err(),
        StoreError::Closed
    );
}

#[tokio::test]
async fn test_unreachable_server_is_unavailable() {
    let result = RedisCounterBackend::connect("redis://127.0.0.1:1/0").await;
    assert!(matches!(result, Err(StoreError::Unavailable(_))));
}
