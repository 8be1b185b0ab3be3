//! Prometheus metrics for scoring

use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    // Scoring metrics
    /// Scoring calls by outcome label
    pub static ref SCORING_OUTCOMES: IntCounterVec = IntCounterVec::new(
        Opts::new("scoring_outcomes_total", "Scoring calls by outcome"),
        &["outcome"]
    ).expect("metric can be created");

    /// Recommended actions
    pub static ref RISK_ACTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("risk_actions_total", "Recommended actions for scored requests"),
        &["action"]
    ).expect("metric can be created");

    /// End-to-end scoring latency
    pub static ref SCORING_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("scoring_duration_seconds", "End-to-end scoring duration in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0])
    ).expect("metric can be created");

    // Signal source metrics
    /// Lookups that produced no fact
    pub static ref DEGRADED_LOOKUPS: IntCounterVec = IntCounterVec::new(
        Opts::new("degraded_lookups_total", "Lookups that timed out or failed"),
        &["source"]
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(SCORING_OUTCOMES.clone()))?;
    registry.register(Box::new(RISK_ACTIONS.clone()))?;
    registry.register(Box::new(SCORING_DURATION.clone()))?;
    registry.register(Box::new(DEGRADED_LOOKUPS.clone()))?;
    Ok(())
}

/// Render the registry in Prometheus text format
pub fn metrics_handler(registry: &Registry) -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
