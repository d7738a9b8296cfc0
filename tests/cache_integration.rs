//! Redis integration tests using testcontainers.
//!
//! These tests require Docker to be running. Run them with
//! `cargo test --test cache_integration -- --ignored`.

use std::time::Duration;

use testcontainers::{
    ContainerAsync, GenericImage,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};

use axum_backend_template::domain::CacheStore;
use axum_backend_template::infra::{RedisCache, RedisConfig};

async fn setup_redis() -> (RedisCache, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await
        .expect("Failed to start redis container");

    let port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get redis port");

    let cache = RedisCache::connect(
        &format!("redis://127.0.0.1:{port}"),
        RedisConfig {
            connect_timeout: Duration::from_secs(5),
            op_timeout: Duration::from_secs(2),
        },
    )
    .await
    .expect("Failed to connect to redis");

    (cache, container)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_set_get_delete() {
    let (cache, _container) = setup_redis().await;

    cache
        .set("user:1", r#"{"id":1}"#, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(
        cache.get("user:1").await.unwrap().as_deref(),
        Some(r#"{"id":1}"#)
    );

    cache.delete(&["user:1".to_string()]).await.unwrap();
    assert_eq!(cache.get("user:1").await.unwrap(), None);
    assert!(cache.health_check().await.is_ok());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_window_counts_and_expires_in_milliseconds() {
    let (cache, _container) = setup_redis().await;
    let window = Duration::from_millis(300);

    let first = cache.incr_window("rate_limit:ip:a", window).await.unwrap();
    assert_eq!(first.count, 1);
    assert!(first.resets_in <= window);
    assert!(first.resets_in > Duration::ZERO);

    // Later hits keep the window's original expiry
    let second = cache.incr_window("rate_limit:ip:a", window).await.unwrap();
    assert_eq!(second.count, 2);
    assert!(second.resets_in <= first.resets_in);

    tokio::time::sleep(window + Duration::from_millis(100)).await;
    let fresh = cache.incr_window("rate_limit:ip:a", window).await.unwrap();
    assert_eq!(fresh.count, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_concurrent_hits_are_all_counted() {
    let (cache, _container) = setup_redis().await;
    let cache = std::sync::Arc::new(cache);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let cache = std::sync::Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            cache
                .incr_window("rate_limit:user:7", Duration::from_secs(60))
                .await
                .unwrap()
                .count
        }));
    }
    let mut counts = Vec::new();
    for handle in handles {
        counts.push(handle.await.unwrap());
    }
    counts.sort_unstable();
    assert_eq!(counts, (1..=20).collect::<Vec<u64>>());
}
