use ad_platform_gateway::clock::MockClock;
use ad_platform_gateway::error::{AppError, Result};
use ad_platform_gateway::idempotency::{
    IdempotencyCache, IdempotencyCleanupJob, IdempotencyHandler, IdempotentOutcome,
};
use chrono::Duration;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn handler(ttl_seconds: i64) -> (Arc<IdempotencyHandler>, MockClock) {
    let clock = MockClock::default();
    let handler = IdempotencyHandler::new(ttl_seconds, Arc::new(clock.clone()));
    (Arc::new(handler), clock)
}

#[tokio::test]
async fn test_entry_lives_for_exactly_ttl() {
    let clock = MockClock::default();
    let cache = IdempotencyCache::new(60, Arc::new(clock.clone()));
    cache.set("k", json!({"campaign_id": "cmp_meta_1"})).await;

    clock.advance(Duration::seconds(60));
    assert_eq!(cache.get("k").await, Some(json!({"campaign_id": "cmp_meta_1"})));

    clock.advance(Duration::seconds(1));
    assert_eq!(cache.get("k").await, None);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_set_overwrites_and_restarts_ttl() {
    let clock = MockClock::default();
    let cache = IdempotencyCache::new(60, Arc::new(clock.clone()));
    cache.set("k", json!(1)).await;
    clock.advance(Duration::seconds(50));
    cache.set("k", json!(2)).await;
    clock.advance(Duration::seconds(50));

    assert_eq!(cache.get("k").await, Some(json!(2)));
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_sweep_removes_only_expired_entries() {
    let clock = MockClock::default();
    let cache = IdempotencyCache::new(120, Arc::new(clock.clone()));

    cache.set("a", json!("first")).await;
    clock.advance(Duration::seconds(100));
    cache.set("b", json!("second")).await;
    clock.advance(Duration::seconds(30));

    assert_eq!(cache.sweep_expired().await, 1);
    assert!(!cache.has("a").await);
    assert!(cache.has("b").await);
}

#[tokio::test]
async fn test_cleanup_job_sweeps_handler_cache() {
    let (handler, clock) = handler(10);
    handler
        .execute(Some("k"), || async { Ok::<_, AppError>(1u32) })
        .await
        .unwrap();
    clock.advance(Duration::seconds(11));

    let job = IdempotencyCleanupJob::new(Arc::clone(&handler), 60);
    assert_eq!(job.run_once().await, 1);
    assert_eq!(handler.cached_entries().await, 0);
}

#[tokio::test]
async fn test_replay_after_success() {
    let (handler, _) = handler(3600);
    let calls = &AtomicU32::new(0);

    let run = move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, AppError>(json!({"campaign_id": "cmp_google_ab"}))
    };

    let first = handler.execute(Some("key-1"), run).await.unwrap();
    let second = handler.execute(Some("key-1"), run).await.unwrap();

    assert!(!first.is_replay());
    assert!(second.is_replay());
    assert_eq!(first.into_inner(), second.into_inner());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let snapshot = handler.metrics().snapshot();
    assert_eq!(snapshot.total_requests, 2);
    assert_eq!(snapshot.replayed_requests, 1);
    assert_eq!(snapshot.replay_rate(), 0.5);
}

#[tokio::test]
async fn test_expired_key_runs_again() {
    let (handler, clock) = handler(60);
    let calls = &AtomicU32::new(0);

    let run = move || async move { Ok::<_, AppError>(calls.fetch_add(1, Ordering::SeqCst)) };

    handler.execute(Some("k"), run).await.unwrap();
    clock.advance(Duration::seconds(61));
    let outcome = handler.execute(Some("k"), run).await.unwrap();

    assert_eq!(outcome, IdempotentOutcome::Fresh(1));
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let (handler, _) = handler(3600);

    let failed: Result<IdempotentOutcome<u32>> = handler
        .execute(Some("k"), || async {
            Err(AppError::service_unavailable("Platform temporarily unavailable"))
        })
        .await;
    assert!(failed.is_err());
    assert_eq!(handler.cached_entries().await, 0);

    let retried = handler
        .execute(Some("k"), || async { Ok::<_, AppError>(7u32) })
        .await
        .unwrap();
    assert_eq!(retried, IdempotentOutcome::Fresh(7));
    assert_eq!(handler.metrics().snapshot().failed_requests, 1);
}

#[tokio::test]
async fn test_missing_key_always_executes() {
    let (handler, _) = handler(3600);
    let calls = &AtomicU32::new(0);

    for _ in 0..3 {
        let outcome = handler
            .execute(None, move || async move {
                Ok::<_, AppError>(calls.fetch_add(1, Ordering::SeqCst))
            })
            .await
            .unwrap();
        assert!(!outcome.is_replay());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(handler.cached_entries().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_execute_once() {
    let (handler, _) = handler(3600);
    let calls = Arc::new(AtomicU32::new(0));

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let handler = Arc::clone(&handler);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                handler
                    .execute(Some("shared"), || async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                        Ok::<_, AppError>(format!("cmp_meta_{}", n))
                    })
                    .await
            })
        })
        .collect();

    let mut fresh = 0;
    let mut values = Vec::new();
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        if !outcome.is_replay() {
            fresh += 1;
        }
        values.push(outcome.into_inner());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(fresh, 1);
    assert!(values.iter().all(|v| v == "cmp_meta_0"));
    assert_eq!(handler.in_flight(), 0);
}

#[tokio::test]
async fn test_cancelled_waiter_releases_gate() {
    let (handler, _) = handler(3600);
    let release = &tokio::sync::Notify::new();
    let no_wait = std::time::Duration::ZERO;

    let holder = handler.execute(Some("shared"), move || async move {
        release.notified().await;
        Ok::<_, AppError>(1u32)
    });
    tokio::pin!(holder);
    // First poll runs the operation up to the release point.
    assert!(tokio::time::timeout(no_wait, &mut holder).await.is_err());

    {
        let waiter = handler.execute(Some("shared"), || async { Ok::<_, AppError>(2u32) });
        tokio::pin!(waiter);
        assert!(tokio::time::timeout(no_wait, &mut waiter).await.is_err());
        assert_eq!(handler.in_flight(), 1);

        // The holder finishes and wakes the waiter, which is dropped before it runs again.
        release.notify_one();
        assert_eq!(holder.as_mut().await.unwrap().into_inner(), 1);
    }

    assert_eq!(handler.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_run_in_parallel() {
    let (handler, _) = handler(3600);

    let tasks: Vec<_> = (0..5)
        .map(|i| {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let key = format!("key-{}", i);
                handler
                    .execute(Some(key.as_str()), || async move { Ok::<_, AppError>(i) })
                    .await
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap().unwrap(), IdempotentOutcome::Fresh(i));
    }
    assert_eq!(handler.cached_entries().await, 5);
}
