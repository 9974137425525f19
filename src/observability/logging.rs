//! Structured logging.
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` (from `RUST_LOG`,
//! falling back to the configured level) and a `fmt` layer in pretty or
//! JSON form.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(config: &ObservabilityConfig) -> String {
    let level = config.log_level.to_ascii_lowercase();
    format!("readiness_server={level},tower_http={level}")
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config)));

    let (json, pretty) = match config.log_format {
        LogFormat::Json => (Some(fmt::layer().json().flatten_event(true)), None),
        LogFormat::Pretty => (None, Some(fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_use_configured_level() {
        let config = ObservabilityConfig {
            log_level: "DEBUG".into(),
            log_format: LogFormat::Json,
        };
        assert_eq!(
            default_directives(&config),
            "readiness_server=debug,tower_http=debug"
        );
    }
}
