//! Integration tests for startup retry behavior.

use db_lifecycle::{
    ConnectionFactory, ConnectionOptions, ConnectionRegistry, DbError, ModelRegistry, RetryPolicy,
    with_retry,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

fn temp_sqlite_url() -> String {
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file
        .into_temp_path()
        .keep()
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    format!("sqlite:{}", db_path)
}

fn setup() -> (Arc<ConnectionRegistry>, ConnectionFactory) {
    let registry = Arc::new(ConnectionRegistry::new());
    let factory = ConnectionFactory::new(Arc::clone(&registry), Arc::new(ModelRegistry::new()));
    (registry, factory)
}

#[tokio::test]
async fn test_startup_recovers_after_transient_failures() {
    let (registry, factory) = setup();
    let url = temp_sqlite_url();
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_inner = Arc::clone(&attempts);

    // A connect sequence that is down for the first two attempts and then
    // reachable, under a 3-attempt budget with a short fixed delay.
    let policy = RetryPolicy::fixed(3, Duration::from_millis(10));
    let handle = with_retry(policy, || {
        let attempts = Arc::clone(&attempts_inner);
        let factory = factory.clone();
        let url = url.clone();
        async move {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(DbError::connection("server not up yet", "retry"));
            }
            factory
                .create_connection(&ConnectionOptions::from_uri(url))
                .await
        }
    })
    .await
    .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(!handle.is_closed());
    assert!(registry.contains("default").await);
}

#[tokio::test]
async fn test_configuration_conflict_skips_retry_budget() {
    let (_registry, factory) = setup();
    let options = ConnectionOptions {
        // A generous budget with long delays that must never be consumed.
        retry_attempts: Some(5),
        retry_delay_ms: Some(2000),
        ..ConnectionOptions::from_uri(temp_sqlite_url())
    };

    factory.create_connection(&options).await.unwrap();

    let started = Instant::now();
    let result = factory.create_connection(&options).await;

    assert!(matches!(result, Err(DbError::DuplicateConnection { .. })));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_invalid_configuration_fails_without_retry() {
    let (registry, factory) = setup();
    let started = Instant::now();

    let result = factory
        .create_connection(&ConnectionOptions {
            retry_attempts: Some(5),
            retry_delay_ms: Some(2000),
            ..ConnectionOptions::default()
        })
        .await;

    assert!(matches!(result, Err(DbError::Config { .. })));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(registry.count().await, 0);
}
