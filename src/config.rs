use std::env;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_SEND_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Incomplete database settings, missing {0}")]
    MissingDatabaseSetting(&'static str),
}

/// Tuning knobs for the subscriber hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// How long a single delivery may take before the subscriber is evicted
    pub send_timeout: Duration,
    /// Per-connection outbound queue length; a full queue counts as a failed delivery
    pub outbound_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

/// Service configuration, read from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// None selects the in-memory store
    pub database_url: Option<String>,
    pub hub: HubConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any key lookup, so tests don't touch the process env
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let send_timeout_ms = parse_or(&lookup, "HUB_SEND_TIMEOUT_MS", DEFAULT_SEND_TIMEOUT_MS)?;
        let outbound_buffer = parse_or(&lookup, "HUB_OUTBOUND_BUFFER", DEFAULT_OUTBOUND_BUFFER)?;
        if outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                name: "HUB_OUTBOUND_BUFFER",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            bind_addr,
            database_url: database_url(&lookup)?,
            hub: HubConfig {
                send_timeout: Duration::from_millis(send_timeout_ms),
                outbound_buffer,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

/// DATABASE_URL wins; otherwise the WS_DATABASE_* settings are assembled into one,
/// with the credentials percent-encoded
fn database_url<F>(lookup: &F) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL") {
        return Ok(Some(url));
    }

    let Some(host) = lookup("WS_DATABASE_HOST") else {
        return Ok(None);
    };

    let require = |name: &'static str| lookup(name).ok_or(ConfigError::MissingDatabaseSetting(name));
    let user = require("WS_DATABASE_USER")?;
    let password = require("WS_DATABASE_PASSWORD")?;
    let name = require("WS_DATABASE_NAME")?;
    let port = lookup("WS_DATABASE_PORT").unwrap_or_else(|| "5432".to_string());

    Ok(Some(format!(
        "postgres://{}:{}@{host}:{port}/{name}",
        urlencoding::encode(&user),
        urlencoding::encode(&password),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_use_in_memory_store() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert!(config.database_url.is_none());
        assert_eq!(config.hub.send_timeout, Duration::from_secs(5));
        assert_eq!(config.hub.outbound_buffer, 64);
    }

    #[test]
    fn test_database_url_assembled_from_parts() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("WS_DATABASE_USER", "chat"),
            ("WS_DATABASE_PASSWORD", "secret"),
            ("WS_DATABASE_HOST", "db"),
            ("WS_DATABASE_PORT", "5433"),
            ("WS_DATABASE_NAME", "rooms"),
        ]))
        .unwrap();

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://chat:secret@db:5433/rooms")
        );
    }

    #[test]
    fn test_database_credentials_are_percent_encoded() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("WS_DATABASE_USER", "chat admin"),
            ("WS_DATABASE_PASSWORD", "p@ss/w:rd"),
            ("WS_DATABASE_HOST", "db"),
            ("WS_DATABASE_NAME", "rooms"),
        ]))
        .unwrap();

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://chat%20admin:p%40ss%2Fw%3Ard@db:5432/rooms")
        );
    }

    #[test]
    fn test_database_url_takes_precedence() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/app"),
            ("WS_DATABASE_HOST", "ignored"),
        ]))
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/app"));
    }

    #[test]
    fn test_partial_database_settings_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("WS_DATABASE_HOST", "db")]));

        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingDatabaseSetting("WS_DATABASE_USER")
        );
    }

    #[rstest]
    #[case("HUB_SEND_TIMEOUT_MS", "soon")]
    #[case("HUB_SEND_TIMEOUT_MS", "-1")]
    #[case("HUB_OUTBOUND_BUFFER", "many")]
    #[case("HUB_OUTBOUND_BUFFER", "0")]
    fn test_invalid_hub_settings_rejected(#[case] name: &str, #[case] value: &str) {
        let result = AppConfig::from_lookup(lookup_from(&[(name, value)]));

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
