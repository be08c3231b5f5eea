//! Targets with defaults resolved.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::TargetConfig;

/// Base delay used when a target configures none.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(10);

/// Jitter fraction used when a target configures none.
pub const DEFAULT_JITTER: f64 = 0.2;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid url '{url}': {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid header '{0}'")]
    Header(String),
}

/// A target ready to be pinged.
#[derive(Debug, Clone, Serialize)]
pub struct TargetSpec {
    pub name: String,
    #[serde(serialize_with = "serialize_url")]
    pub url: Url,
    #[serde(serialize_with = "serialize_millis")]
    pub delay: Duration,
    pub jitter: f64,
    pub workers: usize,
    #[serde(skip)]
    pub headers: HeaderMap,
    pub traced: bool,
}

impl TargetSpec {
    pub fn from_config(config: &TargetConfig) -> Result<Self, TargetError> {
        let url = Url::parse(&config.url).map_err(|source| TargetError::Url {
            url: config.url.clone(),
            source,
        })?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|_| TargetError::Header(name.clone()))?;
            let header_value = HeaderValue::from_str(value).map_err(|_| TargetError::Header(name.clone()))?;
            headers.append(header_name, header_value);
        }

        let name = match config.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => config.url.clone(),
        };

        let delay = if config.delay > 0 {
            Duration::from_millis(config.delay as u64)
        } else {
            DEFAULT_DELAY
        };

        let jitter = if config.jitter > 0.0 {
            config.jitter
        } else {
            DEFAULT_JITTER
        };

        Ok(Self {
            name,
            url,
            delay,
            jitter,
            workers: config.workers.max(1) as usize,
            headers,
            traced: config.otel_enabled,
        })
    }

    /// Host (and port, if any) of the URL, used as the span `target` attribute.
    pub fn host(&self) -> String {
        match (self.url.host_str(), self.url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => self.url.to_string(),
        }
    }
}

fn serialize_url<S: serde::Serializer>(url: &Url, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(url.as_str())
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let spec = TargetSpec::from_config(&TargetConfig::new("http://localhost:8080/health")).unwrap();

        assert_eq!(spec.name, "http://localhost:8080/health");
        assert_eq!(spec.delay, DEFAULT_DELAY);
        assert_eq!(spec.jitter, DEFAULT_JITTER);
        assert_eq!(spec.workers, 1);
        assert!(!spec.traced);
        assert_eq!(spec.host(), "localhost:8080");
    }

    #[test]
    fn test_non_positive_workers_become_one() {
        for workers in [0, -1, -100] {
            let mut config = TargetConfig::new("http://example.com/");
            config.workers = workers;
            assert_eq!(TargetSpec::from_config(&config).unwrap().workers, 1);
        }

        let mut config = TargetConfig::new("http://example.com/");
        config.workers = 4;
        assert_eq!(TargetSpec::from_config(&config).unwrap().workers, 4);
    }

    #[test]
    fn test_explicit_values_kept() {
        let mut config = TargetConfig::new("https://example.com/");
        config.name = Some("home".into());
        config.delay = 250;
        config.jitter = 0.5;
        config.otel_enabled = true;
        config.headers.insert("x-zombie".into(), "1".into());

        let spec = TargetSpec::from_config(&config).unwrap();
        assert_eq!(spec.name, "home");
        assert_eq!(spec.delay, Duration::from_millis(250));
        assert_eq!(spec.jitter, 0.5);
        assert!(spec.traced);
        assert_eq!(spec.headers.get("x-zombie").unwrap(), "1");
        assert_eq!(spec.host(), "example.com");
    }

    #[test]
    fn test_empty_name_falls_back_to_url() {
        let mut config = TargetConfig::new("http://example.com/");
        config.name = Some(String::new());
        assert_eq!(TargetSpec::from_config(&config).unwrap().name, "http://example.com/");
    }

    #[test]
    fn test_negative_delay_and_jitter_use_defaults() {
        let mut config = TargetConfig::new("http://example.com/");
        config.delay = -5;
        config.jitter = -0.3;

        let spec = TargetSpec::from_config(&config).unwrap();
        assert_eq!(spec.delay, DEFAULT_DELAY);
        assert_eq!(spec.jitter, DEFAULT_JITTER);
    }

    #[test]
    fn test_invalid_input_rejected() {
        assert!(matches!(
            TargetSpec::from_config(&TargetConfig::new("not a url")),
            Err(TargetError::Url { .. })
        ));

        let mut config = TargetConfig::new("http://example.com/");
        config.headers.insert("bad header".into(), "x".into());
        assert!(matches!(TargetSpec::from_config(&config), Err(TargetError::Header(_))));
    }
}
