//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ClusterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ClusterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ClusterConfig, ConfigError> {
    let config: ClusterConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [balancer]
            bind_address = "127.0.0.1:9500"

            [[backends]]
            id = "n1"
            address = "127.0.0.1:9501"

            [[backends]]
            id = "n2"
            address = "127.0.0.1:9502"

            [sync]
            interval_ms = 400
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.balancer.bind_address, "127.0.0.1:9500");
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.sync.interval_ms, 400);
    }

    #[test]
    fn shipped_sample_matches_defaults() {
        let config = parse_config(include_str!("../../cluster.toml")).unwrap();
        let defaults = ClusterConfig::default();
        assert_eq!(config.balancer.bind_address, defaults.balancer.bind_address);
        assert_eq!(config.backends.len(), defaults.backends.len());
        assert_eq!(config.sync.interval_ms, defaults.sync.interval_ms);
        assert_eq!(config.protocol.max_frame_length, defaults.protocol.max_frame_length);
    }

    #[test]
    fn validation_errors_are_joined() {
        let err = parse_config("backends = []").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("at least one backend"));
    }

    #[test]
    fn syntax_errors_surface_as_parse() {
        let err = parse_config("[balancer\nbind_address = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
