//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check membership integrity (unique ids and addresses)
//! - Validate value ranges (intervals and timeouts > 0, frame limit sane)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClusterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ClusterConfig;

const MIN_FRAME_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one backend must be configured")]
    NoBackends,
    #[error("backend #{0} has an empty id")]
    EmptyBackendId(usize),
    #[error("backend id `{0}` names a data file and cannot contain path separators")]
    BackendIdPath(String),
    #[error("duplicate backend id `{0}`")]
    DuplicateBackendId(String),
    #[error("`{field}` is not a socket address: {value}")]
    InvalidAddress { field: String, value: String },
    #[error("address {0} is used more than once")]
    DuplicateAddress(String),
    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),
    #[error("protocol.max_frame_length must be at least 64 bytes")]
    FrameTooSmall,
}

pub fn validate_config(config: &ClusterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut ids = HashSet::new();
    let mut addresses = HashSet::new();

    check_address("balancer.bind_address", &config.balancer.bind_address, &mut addresses, &mut errors);

    for (i, backend) in config.backends.iter().enumerate() {
        if backend.id.trim().is_empty() {
            errors.push(ValidationError::EmptyBackendId(i));
        } else if backend.id.contains(['/', '\\']) {
            errors.push(ValidationError::BackendIdPath(backend.id.clone()));
        } else if !ids.insert(backend.id.as_str()) {
            errors.push(ValidationError::DuplicateBackendId(backend.id.clone()));
        }
        check_address(&format!("backends[{i}].address"), &backend.address, &mut addresses, &mut errors);
        if backend.max_connections == 0 {
            errors.push(ValidationError::Zero("backends.max_connections"));
        }
    }

    let positive = [
        ("balancer.max_connections", config.balancer.max_connections as u64),
        ("balancer.forward_timeout_ms", config.balancer.forward_timeout_ms),
        ("health_check.interval_ms", config.health_check.interval_ms),
        ("health_check.timeout_ms", config.health_check.timeout_ms),
        ("sync.interval_ms", config.sync.interval_ms),
        ("sync.timeout_ms", config.sync.timeout_ms),
        ("sync.max_concurrent", config.sync.max_concurrent as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if config.protocol.max_frame_length < MIN_FRAME_LENGTH {
        errors.push(ValidationError::FrameTooSmall);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(
    field: &str,
    value: &str,
    seen: &mut HashSet<SocketAddr>,
    errors: &mut Vec<ValidationError>,
) {
    match value.parse::<SocketAddr>() {
        Ok(addr) => {
            // Port 0 means "pick one", so it can legitimately repeat.
            if addr.port() != 0 && !seen.insert(addr) {
                errors.push(ValidationError::DuplicateAddress(value.to_string()));
            }
        }
        Err(_) => errors.push(ValidationError::InvalidAddress {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ClusterConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ClusterConfig::default();
        config.backends = vec![
            BackendConfig::new("a", "127.0.0.1:7001"),
            BackendConfig::new("a", "127.0.0.1:7001"),
            BackendConfig::new("", "not-an-address"),
        ];
        config.sync.max_concurrent = 0;
        config.health_check.interval_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateBackendId("a".into())));
        assert!(errors.contains(&ValidationError::DuplicateAddress("127.0.0.1:7001".into())));
        assert!(errors.contains(&ValidationError::EmptyBackendId(2)));
        assert!(errors.contains(&ValidationError::Zero("sync.max_concurrent")));
        assert!(errors.contains(&ValidationError::Zero("health_check.interval_ms")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidAddress { value, .. } if value == "not-an-address")));
    }

    #[test]
    fn balancer_cannot_share_a_backend_address() {
        let mut config = ClusterConfig::default();
        config.balancer.bind_address = "127.0.0.1:8001".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicateAddress("127.0.0.1:8001".into())]);
    }

    #[test]
    fn ids_cannot_escape_the_data_dir() {
        let mut config = ClusterConfig::default();
        config.backends = vec![
            BackendConfig::new("../x", "127.0.0.1:7001"),
            BackendConfig::new("a\\b", "127.0.0.1:7002"),
            BackendConfig::new("server_1", "127.0.0.1:7003"),
        ];
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![
                ValidationError::BackendIdPath("../x".into()),
                ValidationError::BackendIdPath("a\\b".into()),
            ]
        );
    }

    #[test]
    fn empty_membership_is_rejected() {
        let mut config = ClusterConfig::default();
        config.backends.clear();
        assert_eq!(validate_config(&config).unwrap_err(), vec![ValidationError::NoBackends]);
    }
}
