//! Tracing setup

use crate::config::TelemetrySettings;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {}", e))?;
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {}", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_installs_once() {
        let settings = TelemetrySettings {
            log_level: "info".to_string(),
            json: true,
        };

        // Another test may already own the global subscriber
        let _ = init_tracing(&settings);
        assert!(init_tracing(&settings).is_err());
    }
}
