//! Fraud risk scoring
//!
//! Scores identity signals (email, IP, metadata) per tenant:
//! - Tenant admission through [`rate_limiter::TenantRateLimiter`]
//! - Concurrent signal lookups, each under its own timeout
//! - Pure rule evaluation over a closed set of facts
//! - Clamped aggregation into a score, risk level and recommended action
//!
//! # Usage
//!
//! ```rust,no_run
//! use risk_engine::{Settings, ScoringOutcome, ScoringRequest, ScoringService};
//! use signal_lookups::StaticGeoResolver;
//! use std::sync::Arc;
//!
//! # async fn example() -> risk_engine::Result<()> {
//! let settings = Settings::from_env()?;
//! let service = ScoringService::connect(&settings, Arc::new(StaticGeoResolver::new())).await?;
//!
//! let request = ScoringRequest::new("org-42").with_email("user@mailinator.com");
//! if let ScoringOutcome::Scored(report) = service.score(request).await {
//!     println!("{} -> {}", report.result.score, report.result.action.as_str());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod recorder;
pub mod rules;
pub mod scoring;
pub mod telemetry;
pub mod types;

pub use self::config::{EngineConfig, RuleWeights, Settings};
pub use error::{Error, Result};
pub use orchestrator::{ScoringService, SignalSources};
pub use recorder::{CheckRecord, CheckRecorder, CheckStats, MemoryRecorder, TracingRecorder};
pub use scoring::{aggregate, ActionPolicy};
pub use types::*;
