use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::{Config, ServiceMode};
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Validate version
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.workspace_root.trim().is_empty() {
        return Err(invalid("workspace_root must not be empty"));
    }
    if config.worker_count == 0 {
        return Err(invalid("worker_count must be greater than 0"));
    }
    if config.fanout.max_concurrent_segments == 0 {
        return Err(invalid("fanout.max_concurrent_segments must be greater than 0"));
    }
    let retry = &config.fanout.retry;
    if retry.escalations > 0 && retry.step_delay_ms == 0 {
        return Err(invalid(
            "fanout.retry.step_delay_ms must be greater than 0 when escalations are enabled",
        ));
    }
    if config.timeouts.call_timeout_secs == 0 {
        return Err(invalid("timeouts.call_timeout_secs must be greater than 0"));
    }
    if config.stock.overfetch_factor == 0 {
        return Err(invalid("stock.overfetch_factor must be at least 1"));
    }

    // Validate music tracks
    if config.music.tracks.is_empty() {
        return Err(invalid("music.tracks must list at least one track"));
    }
    let mut seen = HashSet::new();
    for track in &config.music.tracks {
        if track.trim().is_empty() {
            return Err(invalid("music.tracks must not contain empty names"));
        }
        if !seen.insert(track) {
            return Err(ConfigError::Validation {
                message: format!("Duplicate music track: {}", track),
            });
        }
    }

    if config.services.mode == ServiceMode::Http {
        let services = &config.services;
        let endpoints = [
            ("services.openai.base_url", &services.openai.base_url),
            ("services.aligner.url", &services.aligner.url),
            ("services.stock.url", &services.stock.url),
            ("services.images.url", &services.images.url),
            ("services.stitcher.url", &services.stitcher.url),
        ];
        for (name, url) in endpoints {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Validation {
                    message: format!("{} must be an http(s) URL, got '{}'", name, url),
                });
            }
        }
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.fanout.max_concurrent_segments, 20);
        assert_eq!(config.fanout.retry.first_delay_ms, 5_000);
        assert_eq!(config.fanout.retry.step_delay_ms, 10_000);
        assert!(config.stock.require_full_coverage);
        assert_eq!(config.music.tracks.len(), 9);
        assert_eq!(config.services.mode, ServiceMode::Http);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.worker_count > 0);
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "workspace_root": "/var/lib/reelgen",
            "database_path": "/var/lib/reelgen/jobs.db",
            "worker_count": 2,
            "fanout": {
                "max_concurrent_segments": 4,
                "retry": { "first_delay_ms": 100, "step_delay_ms": 50, "escalations": 3 }
            },
            "timeouts": { "call_timeout_secs": 60 },
            "stock": { "require_full_coverage": false },
            "music": { "tracks": ["_nas", "_fallen"] },
            "logging": { "level": "debug", "format": "json" },
            "services": {
                "mode": "stub",
                "openai": { "api_key": { "file": "/run/secrets/openai" } }
            }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.workspace_root, "/var/lib/reelgen");
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.fanout.max_concurrent_segments, 4);
        assert_eq!(config.fanout.retry.escalations, 3);
        assert_eq!(config.timeouts.call_timeout_secs, 60);
        assert_eq!(config.timeouts.connect_timeout_secs, 10);
        assert!(!config.stock.require_full_coverage);
        assert_eq!(config.music.tracks, vec!["_nas", "_fallen"]);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.services.mode, ServiceMode::Stub);
        assert_eq!(
            config.services.openai.api_key.file.as_deref(),
            Some("/run/secrets/openai")
        );
    }

    #[test]
    fn test_invalid_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "fanout": { "max_concurrent_segments": 0 } }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_tracks_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "music": { "tracks": ["_nas", "_nas"] } }"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Duplicate music track"), "{}", err);
    }

    #[test]
    fn test_non_http_endpoint_rejected_in_http_mode() {
        let json = r#"{ "version": "1.0", "services": { "stitcher": { "url": "ftp://x" } } }"#;
        assert!(load_config_from_str(json).is_err());

        let json = r#"{ "version": "1.0", "services": { "mode": "stub", "stitcher": { "url": "ftp://x" } } }"#;
        assert!(load_config_from_str(json).is_ok());
    }

    #[test]
    fn test_malformed_json() {
        let result = load_config_from_str("{ version: 1.0 ");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelgen.json");
        std::fs::write(&path, r#"{ "version": "1.0", "worker_count": 3 }"#).unwrap();
        assert_eq!(load_config(&path).unwrap().worker_count, 3);

        let missing = load_config(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::ReadFile { .. })));
    }
}
