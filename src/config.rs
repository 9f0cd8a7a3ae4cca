use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_PROXY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be an http(s) URL, got {value:?}")]
    InvalidUrl { name: &'static str, value: String },
    #[error("{name} must be a positive number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Server-side settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Where `/api/*` requests are forwarded. No trailing slash.
    pub backend_url: String,
    pub proxy_timeout: Duration,
    /// Overrides the port from the leptos site address when set.
    pub port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            proxy_timeout: Duration::from_secs(DEFAULT_PROXY_TIMEOUT_SECS),
            port: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend_url = match var("BACKEND_URL") {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.trim_end_matches('/').to_string()
            }
            Some(url) => {
                return Err(ConfigError::InvalidUrl {
                    name: "BACKEND_URL",
                    value: url,
                })
            }
            None => DEFAULT_BACKEND_URL.to_string(),
        };

        let proxy_timeout = match var("PROXY_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        name: "PROXY_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_PROXY_TIMEOUT_SECS),
        };

        let port = match var("PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(port) if port > 0 => Some(port),
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        name: "PORT",
                        value: raw,
                    })
                }
            },
            None => None,
        };

        Ok(Self {
            backend_url,
            proxy_timeout,
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.backend_url, "http://localhost:8000");
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("BACKEND_URL", "https://rag.internal:9000/"),
            ("PROXY_TIMEOUT_SECS", "120"),
            ("PORT", "3000"),
        ]))
        .unwrap();
        assert_eq!(config.backend_url, "https://rag.internal:9000");
        assert_eq!(config.proxy_timeout, Duration::from_secs(120));
        assert_eq!(config.port, Some(3000));
    }

    #[test]
    fn test_invalid_values() {
        let err = ServerConfig::from_lookup(lookup(&[("BACKEND_URL", "localhost:8000")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { name: "BACKEND_URL", .. }));

        let err = ServerConfig::from_lookup(lookup(&[("PROXY_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name: "PROXY_TIMEOUT_SECS", .. }));

        let err = ServerConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name: "PORT", .. }));
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup(&[("BACKEND_URL", "  ")])).unwrap();
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
    }
}
