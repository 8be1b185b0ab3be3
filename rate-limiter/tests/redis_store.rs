//! Token bucket script against a live Redis
//!
//! Run with `REDIS_URL=redis://localhost:6379 cargo test -- --ignored`.

use rate_limiter::{
    BucketLimits, BucketStore, ManualClock, RateLimiterConfig, RedisBucketStore,
    TenantRateLimiter,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

async fn store() -> Option<RedisBucketStore> {
    let url = std::env::var("REDIS_URL").ok()?;
    Some(
        RedisBucketStore::connect(&url, Duration::from_secs(60))
            .await
            .expect("redis reachable"),
    )
}

fn unique_tenant(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore = "requires REDIS_URL"]
async fn redis_concurrent_acquisitions_never_exceed_capacity() {
    let Some(store) = store().await else { return };

    let config = RateLimiterConfig {
        default_capacity: 20.0,
        default_refill_rate: 0.001,
        ..RateLimiterConfig::default()
    };
    let limiter = Arc::new(
        TenantRateLimiter::new(config, Arc::new(store))
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(10_000.0))),
    );
    let tenant = unique_tenant("org-hot");

    let handles: Vec<_> = (0..200)
        .map(|_| {
            let limiter = limiter.clone();
            let tenant = tenant.clone();
            tokio::spawn(async move { limiter.try_acquire_one(&tenant).await })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_allowed() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 20);
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn redis_bucket_refills_and_reports_retry() {
    let Some(store) = store().await else { return };
    let limits = BucketLimits::new(2.0, 1.0).unwrap();
    let tenant = unique_tenant("org-refill");

    assert!(store.acquire(&tenant, limits, 1.0, 100.0).await.unwrap().allowed);
    assert!(store.acquire(&tenant, limits, 1.0, 100.0).await.unwrap().allowed);

    let denied = store.acquire(&tenant, limits, 1.0, 100.0).await.unwrap();
    assert!(!denied.allowed);
    assert!((denied.retry_after.as_secs_f64() - 1.0).abs() < 1e-6);

    let refilled = store.acquire(&tenant, limits, 1.0, 101.5).await.unwrap();
    assert!(refilled.allowed);
    assert!((refilled.remaining - 0.5).abs() < 1e-9);
}
