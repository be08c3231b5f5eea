//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs, header names/values, jitter ranges, API address shape
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ZombieConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::schema::{TargetConfig, ZombieConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no targets configured")]
    NoTargets,

    #[error("target {index}: invalid url '{url}': {reason}")]
    InvalidUrl { index: usize, url: String, reason: String },

    #[error("target {index}: jitter must be a finite number (got {jitter})")]
    InvalidJitter { index: usize, jitter: f64 },

    #[error("target {index}: invalid header '{name}'")]
    InvalidHeader { index: usize, name: String },

    #[error("api: invalid address '{0}'")]
    InvalidApiAddr(String),

    #[error("tracing: invalid exporter endpoint '{0}'")]
    InvalidExporterEndpoint(String),
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ZombieConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.targets.is_empty() {
        errors.push(ValidationError::NoTargets);
    }

    for (index, target) in config.targets.iter().enumerate() {
        validate_target(index, target, &mut errors);
    }

    if let Some(api) = config.enabled_api() {
        if !is_host_port(&api.addr) {
            errors.push(ValidationError::InvalidApiAddr(api.addr.clone()));
        }
    }

    if let Some(endpoint) = &config.tracing.exporter_endpoint {
        if Url::parse(endpoint).is_err() {
            errors.push(ValidationError::InvalidExporterEndpoint(endpoint.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a non-empty host. Whether the host resolves is left to bind.
fn is_host_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

fn validate_target(index: usize, target: &TargetConfig, errors: &mut Vec<ValidationError>) {
    match Url::parse(&target.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::InvalidUrl {
            index,
            url: target.url.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::InvalidUrl {
            index,
            url: target.url.clone(),
            reason: e.to_string(),
        }),
    }

    // Non-positive values fall back to the default later; only reject non-numbers.
    if !target.jitter.is_finite() {
        errors.push(ValidationError::InvalidJitter {
            index,
            jitter: target.jitter,
        });
    }

    for (name, value) in &target.headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidHeader {
                index,
                name: name.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ApiConfig;

    #[test]
    fn test_valid_config() {
        let config = ZombieConfig {
            targets: vec![TargetConfig::new("http://localhost:8080/")],
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut bad_scheme = TargetConfig::new("ftp://example.com/");
        bad_scheme.jitter = f64::INFINITY;
        bad_scheme.headers.insert("bad header".into(), "v".into());

        let config = ZombieConfig {
            api: Some(ApiConfig {
                enabled: true,
                addr: "not-an-addr".into(),
            }),
            targets: vec![bad_scheme, TargetConfig::new("::nope")],
            ..Default::default()
        };

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::InvalidJitter {
            index: 0,
            jitter: f64::INFINITY
        }));
        assert!(errors.contains(&ValidationError::InvalidHeader {
            index: 0,
            name: "bad header".into()
        }));
        assert!(errors.contains(&ValidationError::InvalidApiAddr("not-an-addr".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidUrl { index: 1, .. })));
    }

    #[test]
    fn test_negative_jitter_is_accepted() {
        let mut target = TargetConfig::new("http://localhost:8080/");
        target.jitter = -0.5;
        target.delay = -10;
        let config = ZombieConfig {
            targets: vec![target],
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_api_address_accepts_host_names() {
        for addr in ["localhost:9090", "0.0.0.0:9090", "[::1]:9090"] {
            let config = ZombieConfig {
                api: Some(ApiConfig {
                    enabled: true,
                    addr: addr.into(),
                }),
                targets: vec![TargetConfig::new("http://localhost:8080/")],
                ..Default::default()
            };
            assert!(validate_config(&config).is_ok(), "{} should be accepted", addr);
        }

        for addr in ["", "localhost", ":9090", "localhost:http", "localhost:70000"] {
            let config = ZombieConfig {
                api: Some(ApiConfig {
                    enabled: true,
                    addr: addr.into(),
                }),
                targets: vec![TargetConfig::new("http://localhost:8080/")],
                ..Default::default()
            };
            assert_eq!(
                validate_config(&config),
                Err(vec![ValidationError::InvalidApiAddr(addr.into())])
            );
        }
    }

    #[test]
    fn test_no_targets() {
        let errors = validate_config(&ZombieConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoTargets]);
    }

    #[test]
    fn test_disabled_api_address_is_ignored() {
        let config = ZombieConfig {
            api: Some(ApiConfig {
                enabled: false,
                addr: "garbage".into(),
            }),
            targets: vec![TargetConfig::new("https://example.com")],
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());
    }
}
