//! Collector configuration resolved from the environment
//!
//! Handles:
//! - Ingestion endpoint and API key (required)
//! - Server display name (falls back to the local hostname)
//! - Collection interval and debug flag with lenient parsing

use reqwest::Url;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const ENV_API_URL: &str = "CRICKET_API_URL";
pub const ENV_API_KEY: &str = "CRICKET_API_KEY";
pub const ENV_SERVER_NAME: &str = "CRICKET_SERVER_NAME";
pub const ENV_COLLECT_INTERVAL: &str = "CRICKET_COLLECT_INTERVAL";
pub const ENV_DEBUG: &str = "CRICKET_DEBUG";

const DEFAULT_API_URL: &str = "http://localhost:3002";
const DEFAULT_COLLECT_INTERVAL_SECS: u64 = 60;

/// Fatal configuration problems. Any of these stops the process before the first cycle.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CRICKET_API_KEY environment variable is required")]
    MissingApiKey,

    #[error("failed to get hostname and CRICKET_SERVER_NAME not set: {0}")]
    ServerName(#[source] std::io::Error),

    #[error("CRICKET_API_URL is not a valid http(s) URL: {0}")]
    InvalidUrl(String),
}

/// Immutable collector settings
#[derive(Clone)]
pub struct Config {
    pub api_url: String,
    pub api_key: String,
    pub server_name: String,
    pub collect_interval_secs: u64,
    pub debug: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("server_name", &self.server_name)
            .field("collect_interval_secs", &self.collect_interval_secs)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Config {
    /// Resolve configuration from the process environment and local hostname
    pub fn resolve() -> Result<Self, ConfigError> {
        Self::resolve_with(
            |key| std::env::var(key).ok(),
            || hostname::get().map(|h| h.to_string_lossy().into_owned()),
        )
    }

    /// Resolve from arbitrary lookups (environment + hostname)
    pub fn resolve_with<E, H>(env: E, local_hostname: H) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
        H: FnOnce() -> std::io::Result<String>,
    {
        // Empty values behave as unset
        let get = |key: &str| env(key).filter(|v| !v.is_empty());

        let api_key = get(ENV_API_KEY).ok_or(ConfigError::MissingApiKey)?;

        let api_url = get(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        match Url::parse(&api_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidUrl(api_url)),
        }

        let server_name = match get(ENV_SERVER_NAME) {
            Some(name) => name,
            None => local_hostname()
                .and_then(|h| {
                    if h.is_empty() {
                        Err(std::io::Error::other("hostname is empty"))
                    } else {
                        Ok(h)
                    }
                })
                .map_err(ConfigError::ServerName)?,
        };

        let collect_interval_secs = get(ENV_COLLECT_INTERVAL)
            .and_then(|v| parse_interval(&v))
            .unwrap_or(DEFAULT_COLLECT_INTERVAL_SECS);

        let debug = get(ENV_DEBUG).and_then(|v| parse_bool(&v)).unwrap_or(false);

        Ok(Config {
            api_url,
            api_key,
            server_name,
            collect_interval_secs,
            debug,
        })
    }

    pub fn collect_interval(&self) -> Duration {
        Duration::from_secs(self.collect_interval_secs)
    }

    /// Full ingestion URL (`{api_url}/api/metrics/ingest`)
    pub fn ingest_url(&self) -> String {
        format!("{}/api/metrics/ingest", self.api_url.trim_end_matches('/'))
    }
}

fn parse_interval(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|secs| *secs > 0)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::resolve_with(|k| map.get(k).cloned(), || Ok("web-01".to_string()))
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        assert!(matches!(resolve(&[]), Err(ConfigError::MissingApiKey)));
        assert!(matches!(
            resolve(&[(ENV_API_KEY, "")]),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn test_defaults() {
        let config = resolve(&[(ENV_API_KEY, "secret")]).unwrap();
        assert_eq!(config.api_url, "http://localhost:3002");
        assert_eq!(config.server_name, "web-01");
        assert_eq!(config.collect_interval_secs, 60);
        assert!(!config.debug);
    }

    #[test]
    fn test_explicit_values() {
        let config = resolve(&[
            (ENV_API_KEY, "secret"),
            (ENV_API_URL, "https://metrics.example.com/"),
            (ENV_SERVER_NAME, "db-primary"),
            (ENV_COLLECT_INTERVAL, "15"),
            (ENV_DEBUG, "TRUE"),
        ])
        .unwrap();
        assert_eq!(config.server_name, "db-primary");
        assert_eq!(config.collect_interval(), Duration::from_secs(15));
        assert!(config.debug);
        assert_eq!(
            config.ingest_url(),
            "https://metrics.example.com/api/metrics/ingest"
        );
    }

    #[test]
    fn test_malformed_values_fall_back() {
        for interval in ["abc", "0", "-5", "1.5"] {
            let config = resolve(&[
                (ENV_API_KEY, "secret"),
                (ENV_COLLECT_INTERVAL, interval),
                (ENV_DEBUG, "yes"),
            ])
            .unwrap();
            assert_eq!(config.collect_interval_secs, 60, "interval {interval}");
            assert!(!config.debug);
        }
    }

    #[test]
    fn test_hostname_failure_without_override() {
        let result = Config::resolve_with(
            |k| (k == ENV_API_KEY).then(|| "secret".to_string()),
            || Err(std::io::Error::other("no hostname")),
        );
        assert!(matches!(result, Err(ConfigError::ServerName(_))));

        let result = Config::resolve_with(
            |k| match k {
                ENV_API_KEY => Some("secret".to_string()),
                ENV_SERVER_NAME => Some("named".to_string()),
                _ => None,
            },
            || Err(std::io::Error::other("no hostname")),
        );
        assert_eq!(result.unwrap().server_name, "named");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = resolve(&[(ENV_API_KEY, "secret"), (ENV_API_URL, "localhost:3002")]);
        assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_debug_output_hides_key() {
        let config = resolve(&[(ENV_API_KEY, "super-secret")]).unwrap();
        let shown = format!("{config:?}");
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("<redacted>"));
    }
}
