use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use futures::future::join_all;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use scheduling_lock_cell::*;
use shared_config::AppConfig;

const SHORT_WAIT: Duration = Duration::from_millis(50);
const HOLD: Duration = Duration::from_secs(5);

#[tokio::test]
async fn second_acquire_times_out_while_first_is_held() {
    let locks = InProcessLockService::new();
    let key = LockKey::doctor(Uuid::new_v4());

    let first = assert_ok!(locks.acquire(&key, SHORT_WAIT, HOLD).await);
    let second = locks.acquire(&key, SHORT_WAIT, HOLD).await;

    assert_matches!(second, Err(LockError::Timeout { .. }));
    assert!(locks.release(first).await.unwrap());
}

#[tokio::test]
async fn distinct_doctors_do_not_contend() {
    let locks = InProcessLockService::new();

    let a = assert_ok!(locks.acquire(&LockKey::doctor(Uuid::new_v4()), SHORT_WAIT, HOLD).await);
    let b = assert_ok!(locks.acquire(&LockKey::doctor(Uuid::new_v4()), SHORT_WAIT, HOLD).await);

    assert!(locks.release(a).await.unwrap());
    assert!(locks.release(b).await.unwrap());
}

#[tokio::test]
async fn release_wakes_a_waiting_acquirer() {
    let locks = Arc::new(InProcessLockService::new());
    let key = LockKey::doctor(Uuid::new_v4());

    let held = assert_ok!(locks.acquire(&key, SHORT_WAIT, HOLD).await);

    let waiter = {
        let locks = Arc::clone(&locks);
        let key = key.clone();
        tokio::spawn(async move { locks.acquire(&key, Duration::from_secs(2), HOLD).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(locks.release(held).await.unwrap());

    let acquired = waiter.await.unwrap();
    assert_ok!(acquired);
}

#[tokio::test]
async fn expired_lock_can_be_reclaimed() {
    let locks = InProcessLockService::new();
    let key = LockKey::doctor(Uuid::new_v4());

    let stale = assert_ok!(locks.acquire(&key, SHORT_WAIT, Duration::from_millis(30)).await);
    let fresh = assert_ok!(locks.acquire(&key, Duration::from_millis(500), HOLD).await);

    // The stale holder no longer owns the key and must not release the new holder's lock
    assert!(!locks.release(stale).await.unwrap());
    let contender = locks.acquire(&key, SHORT_WAIT, HOLD).await;
    assert_err!(contender);

    assert!(locks.release(fresh).await.unwrap());
}

#[tokio::test]
async fn concurrent_acquirers_are_serialised() {
    let locks = Arc::new(InProcessLockService::new());
    let key = LockKey::doctor(Uuid::new_v4());
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let tasks = (0..8).map(|_| {
        let locks = Arc::clone(&locks);
        let key = key.clone();
        let inside = Arc::clone(&inside);
        let max_inside = Arc::clone(&max_inside);
        tokio::spawn(async move {
            let token = locks.acquire(&key, Duration::from_secs(5), HOLD).await.unwrap();
            let now_inside = inside.fetch_add(1, Ordering::SeqCst) + 1;
            max_inside.fetch_max(now_inside, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            inside.fetch_sub(1, Ordering::SeqCst);
            locks.release(token).await.unwrap();
        })
    });

    for result in join_all(tasks).await {
        result.unwrap();
    }

    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
}

// Runs only when a Redis instance is supplied through REDIS_TEST_URL
#[tokio::test]
async fn redis_lock_round_trip_when_available() {
    let Ok(redis_url) = std::env::var("REDIS_TEST_URL") else {
        eprintln!("REDIS_TEST_URL not set, skipping Redis lock test");
        return;
    };

    let config = AppConfig {
        redis_url: Some(redis_url),
        ..AppConfig::default()
    };
    let locks = RedisLockService::new(&config).await.expect("Failed to connect to Redis");
    let key = LockKey::custom(format!("test_{}", Uuid::new_v4().simple()));

    let token = assert_ok!(locks.acquire(&key, SHORT_WAIT, HOLD).await);
    let blocked = locks.acquire(&key, SHORT_WAIT, HOLD).await;
    assert_matches!(blocked, Err(LockError::Timeout { .. }));

    assert!(locks.release(token.clone()).await.unwrap());
    assert!(!locks.release(token).await.unwrap());
}
