//! Property and concurrency tests for the token bucket
//!
//! - Soundness: at most `C` of `N` concurrent unit acquisitions are admitted
//! - Refill monotonicity: waiting `C / r` always yields another admission
//! - Tokens never leave `[0, C]`

use proptest::prelude::*;
use rate_limiter::{
    BucketLimits, BucketState, ManualClock, MemoryBucketStore, RateLimitResult,
    RateLimiterConfig, TenantRateLimiter,
};
use std::sync::Arc;
use std::time::Duration;

fn limiter(capacity: f64, refill_rate: f64) -> (Arc<TenantRateLimiter>, Arc<ManualClock>) {
    let config = RateLimiterConfig {
        default_capacity: capacity,
        default_refill_rate: refill_rate,
        ..RateLimiterConfig::default()
    };
    let clock = Arc::new(ManualClock::new(10_000.0));
    let limiter = TenantRateLimiter::new(config, Arc::new(MemoryBucketStore::new()))
        .expect("valid config")
        .with_clock(clock.clone());
    (Arc::new(limiter), clock)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_acquisitions_never_exceed_capacity() {
    let (limiter, _clock) = limiter(20.0, 0.001);

    let handles: Vec<_> = (0..200)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.try_acquire_one("org-hot").await })
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

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tenants_are_isolated() {
    let (limiter, _clock) = limiter(3.0, 0.001);

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let limiter = limiter.clone();
            let tenant = format!("org-{}", i % 4);
            tokio::spawn(async move {
                let allowed = limiter.try_acquire_one(&tenant).await.unwrap().is_allowed();
                (tenant, allowed)
            })
        })
        .collect();

    let mut per_tenant = std::collections::HashMap::new();
    for handle in handles {
        let (tenant, allowed) = handle.await.unwrap();
        if allowed {
            *per_tenant.entry(tenant).or_insert(0) += 1;
        }
    }

    assert_eq!(per_tenant.len(), 4);
    assert!(per_tenant.values().all(|&count| count == 3));
}

#[tokio::test]
async fn empty_bucket_admits_after_full_refill_window() {
    let (limiter, clock) = limiter(4.0, 2.0);

    while limiter.try_acquire_one("org-a").await.unwrap().is_allowed() {}

    clock.advance(Duration::from_secs_f64(4.0 / 2.0));
    let result = limiter.try_acquire_one("org-a").await.unwrap();
    assert!(matches!(result, RateLimitResult::Allowed { remaining } if (remaining - 3.0).abs() < 1e-9));
}

proptest! {
    /// Property: tokens stay within [0, capacity] for any acquisition sequence
    #[test]
    fn tokens_stay_in_bounds(
        capacity in 1.0f64..500.0,
        refill_rate in 0.01f64..100.0,
        steps in prop::collection::vec((0.0f64..5.0, 0.1f64..1.0), 1..64),
    ) {
        let limits = BucketLimits::new(capacity, refill_rate).unwrap();
        let mut state = BucketState::full(&limits, 0.0);
        let mut now = 0.0;

        for (gap, cost_fraction) in steps {
            now += gap;
            let cost = (capacity * cost_fraction).max(1.0).min(capacity);
            let acquisition = state.acquire(&limits, cost, now);
            prop_assert!(state.tokens >= 0.0);
            prop_assert!(state.tokens <= capacity);
            prop_assert_eq!(acquisition.remaining, state.tokens);
        }
    }

    /// Property: a denied caller that waits retry_after is admitted
    #[test]
    fn retry_after_is_sufficient(
        capacity in 1.0f64..100.0,
        refill_rate in 0.1f64..50.0,
        drained in 0.0f64..1.0,
    ) {
        let limits = BucketLimits::new(capacity, refill_rate).unwrap();
        let mut state = BucketState { tokens: drained.min(capacity - 1.0).max(0.0) * 0.99, last_refill: 0.0 };

        let first = state.acquire(&limits, 1.0, 0.0);
        if !first.allowed {
            let wait = first.retry_after.as_secs_f64() + 1e-6;
            prop_assert!(state.acquire(&limits, 1.0, wait).allowed);
        }
    }

    /// Property: admissions in a window are bounded by C + r * elapsed
    #[test]
    fn admissions_bounded_by_refill(
        capacity in 1u32..50,
        refill_rate in 0.1f64..10.0,
        attempts in 1usize..300,
        spacing in 0.0f64..0.5,
    ) {
        let limits = BucketLimits::new(capacity as f64, refill_rate).unwrap();
        let mut state = BucketState::full(&limits, 0.0);
        let mut admitted = 0usize;

        for i in 0..attempts {
            if state.acquire(&limits, 1.0, i as f64 * spacing).allowed {
                admitted += 1;
            }
        }

        let elapsed = (attempts.saturating_sub(1)) as f64 * spacing;
        let bound = capacity as f64 + refill_rate * elapsed + 1e-9;
        prop_assert!(admitted as f64 <= bound);
    }
}
