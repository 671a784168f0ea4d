//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the configured level. Records emitted through the
//! `log` facade are forwarded into tracing.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ConfigError;

pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = env_filter(config)?;

    match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(false);
            let subscriber = Registry::default().with(filter).with(fmt_layer);
            tracing::subscriber::set_global_default(subscriber).map_err(already_set)?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer().with_target(true).with_thread_ids(false);
            let subscriber = Registry::default().with(filter).with(fmt_layer);
            tracing::subscriber::set_global_default(subscriber).map_err(already_set)?;
        }
    }

    tracing_log::LogTracer::init().map_err(already_set)?;
    Ok(())
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| ConfigError::Validation {
        message: format!("invalid logging.level '{}': {}", config.level, e),
    })
}

fn already_set(e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Validation {
        message: format!("logging is already initialized: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_configured_level_is_used_without_rust_log() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "reelgen=debug,info".to_string(),
            format: LogFormat::Pretty,
        };
        assert!(env_filter(&config).is_ok());
    }

    #[test]
    #[serial]
    fn test_invalid_level_rejected() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "reelgen=loud".to_string(),
            format: LogFormat::Json,
        };
        match env_filter(&config) {
            Err(ConfigError::Validation { message }) => {
                assert!(message.contains("reelgen=loud"));
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }
}
