use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use ad_platform_gateway::clock::system_clock;
use ad_platform_gateway::error::AppError;
use ad_platform_gateway::idempotency::{IdempotencyCache, IdempotencyHandler};
use ad_platform_gateway::models::{AnalyticsReport, Platform};
use ad_platform_gateway::resilience::RetryPolicy;
use ad_platform_gateway::tokens::TokenLifecycleManager;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

fn benchmark_token_lifecycle(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("tokens");

    let manager = Arc::new(TokenLifecycleManager::new(120, system_clock()));

    group.bench_function("issue", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(manager.issue(Platform::Meta, "act_bench").await)
        });
    });

    for size in [100, 10_000].iter() {
        let (populated, probe) = rt.block_on(async {
            let manager = TokenLifecycleManager::new(120, system_clock());
            let mut probe = String::new();
            for i in 0..*size {
                let pair = manager.issue(Platform::Google, &format!("act_{}", i)).await;
                if i == size / 2 {
                    probe = pair.access_token;
                }
            }
            (manager, probe)
        });

        group.bench_with_input(BenchmarkId::new("validate", size), size, |b, _| {
            b.to_async(&rt)
                .iter(|| async { black_box(populated.validate(&probe).await) });
        });
    }

    group.finish();
}

fn benchmark_idempotency(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("idempotency");
    group.measurement_time(Duration::from_secs(5));

    let cache = IdempotencyCache::new(86_400, system_clock());
    rt.block_on(async {
        for i in 0..10_000 {
            cache.set(&format!("key-{}", i), json!({ "campaign_id": i })).await;
        }
    });

    group.bench_function("cache_hit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(cache.get("key-5000").await) });
    });

    group.bench_function("cache_miss", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(cache.get("absent").await) });
    });

    let handler = IdempotencyHandler::new(86_400, system_clock());

    group.bench_function("execute_fresh_key", |b| {
        b.to_async(&rt).iter(|| async {
            let key = Uuid::new_v4().to_string();
            black_box(
                handler
                    .execute(Some(key.as_str()), || async { Ok::<_, AppError>(42u32) })
                    .await,
            )
        });
    });

    rt.block_on(async {
        let _ = handler
            .execute(Some("replayed"), || async { Ok::<_, AppError>(42u32) })
            .await;
    });

    group.bench_function("execute_replay", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                handler
                    .execute(Some("replayed"), || async { Ok::<_, AppError>(0u32) })
                    .await,
            )
        });
    });

    group.finish();
}

fn benchmark_retry_policy(c: &mut Criterion) {
    let mut group = c.benchmark_group("retry");
    let policy = RetryPolicy::new(5, Duration::from_millis(1000));
    let error = AppError::service_unavailable("Platform temporarily unavailable");

    group.bench_function("backoff_delay", |b| {
        b.iter(|| {
            for attempt in 0..6 {
                black_box(policy.backoff_delay(black_box(attempt)));
            }
        });
    });

    group.bench_function("classify", |b| {
        b.iter(|| black_box(policy.is_retryable(black_box(&error))));
    });

    group.finish();
}

fn benchmark_analytics(c: &mut Criterion) {
    c.bench_function("analytics_report", |b| {
        b.iter(|| {
            for platform in Platform::ALL {
                black_box(AnalyticsReport::from(black_box(platform).base_metrics()));
            }
        });
    });
}

criterion_group!(
    benches,
    benchmark_token_lifecycle,
    benchmark_idempotency,
    benchmark_retry_policy,
    benchmark_analytics,
);

criterion_main!(benches);
