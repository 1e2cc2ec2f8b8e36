//! Service configuration
//!
//! Resolution order, later wins:
//! 1. Built-in defaults
//! 2. JSON config file (optional)
//! 3. Environment: `WEB_PORT`, `API_PORT`, `PG_CONNECTION_STRING` /
//!    `DATABASE_URL`, `PG_SSL`, `PG_HOST`, `EMOTION_LIMIT`
//! 4. Command-line flags (applied by the caller)
//!
//! Setting a database URL in the environment selects the PostgreSQL backend.
//! `PG_HOST` only takes effect when that URL names no host.

use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::class_store::{PostgresConfig, StoreBackend, StoreConfig};
use crate::http_server::HttpServerConfig;

use super::errors::{CliError, CliResult};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listeners and CORS
    #[serde(default)]
    pub http: HttpServerConfig,

    /// Class store backend
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load defaults, then the file if given, then the process environment
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file without applying the environment
    pub fn from_file(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> CliResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = parse_var(&lookup, "WEB_PORT")? {
            self.http.port = port;
        }
        if let Some(port) = parse_var(&lookup, "API_PORT")? {
            self.http.api_port = Some(port);
        }

        let database_url = lookup("PG_CONNECTION_STRING").or_else(|| lookup("DATABASE_URL"));
        if let Some(url) = database_url.filter(|u| !u.trim().is_empty()) {
            info!("database URL found in environment, using postgres backend");
            self.store.backend = StoreBackend::Postgres;
            match self.store.postgres.as_mut() {
                Some(pg) => pg.url = url,
                None => self.store.postgres = Some(PostgresConfig::new(url)),
            }
        }

        if let Some(pg) = self.store.postgres.as_mut() {
            if let Some(ssl) = lookup("PG_SSL") {
                match ssl.as_str() {
                    "true" => pg.ssl = Some(true),
                    "false" => pg.ssl = Some(false),
                    other => warn!(value = other, "PG_SSL must be 'true' or 'false', ignoring"),
                }
            }
            if let Some(host) = lookup("PG_HOST").filter(|h| !h.trim().is_empty()) {
                pg.host = Some(host);
            }
        }

        if let Some(limit) = parse_var(&lookup, "EMOTION_LIMIT")? {
            self.store.emotion_limit = Some(limit);
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> CliResult<()> {
        if self.http.port == 0 {
            return Err(CliError::config_error("http.port must be > 0"));
        }
        self.http
            .validate()
            .map_err(|e| CliError::config_error(format!("HTTP config error: {}", e)))?;

        self.store
            .validate()
            .map_err(|e| CliError::config_error(format!("Store config error: {}", e)))
    }

    /// Configuration as JSON with the database URL masked
    pub fn redacted(&self) -> CliResult<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(url) = value.pointer_mut("/store/postgres/url") {
            *url = Value::String("<redacted>".to_string());
        }
        Ok(value)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> CliResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CliError::config_error(format!("Invalid {} value '{}': {}", key, raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http.port, 4227);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("classsense.json");
        fs::write(&path, r#"{"http": {"port": 9000}, "store": {"emotion_limit": 50}}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.store.emotion_limit, Some(50));
    }

    #[test]
    fn test_from_file_invalid_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert_eq!(err.code_str(), "CLASSSENSE_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_env_ports_and_limit() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("WEB_PORT", "8000"), ("API_PORT", "8001"), ("EMOTION_LIMIT", "25")]))
            .unwrap();

        assert_eq!(config.http.port, 8000);
        assert_eq!(config.http.api_port, Some(8001));
        assert_eq!(config.store.emotion_limit, Some(25));
    }

    #[test]
    fn test_env_database_url_selects_postgres() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("DATABASE_URL", "postgres://cs@db/classsense"),
                ("PG_SSL", "true"),
                ("PG_HOST", "/var/run/postgresql"),
            ]))
            .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Postgres);
        let pg = config.store.postgres.as_ref().unwrap();
        assert_eq!(pg.url, "postgres://cs@db/classsense");
        assert_eq!(pg.ssl, Some(true));
        assert_eq!(pg.host.as_deref(), Some("/var/run/postgresql"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pg_connection_string_wins_over_database_url() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("PG_CONNECTION_STRING", "postgres://primary/db"),
                ("DATABASE_URL", "postgres://other/db"),
            ]))
            .unwrap();

        assert_eq!(config.store.postgres.unwrap().url, "postgres://primary/db");
    }

    #[test]
    fn test_env_bad_port_is_config_error() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("WEB_PORT", "http")])).unwrap_err();
        assert_eq!(err.code_str(), "CLASSSENSE_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_validate_rejects_zero_emotion_limit() {
        let mut config = Config::default();
        config.apply_env(env(&[("EMOTION_LIMIT", "0")])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_cors_origin() {
        let mut config = Config::default();
        config.http.cors_origins = vec!["http://ok.example".into(), "http://x\u{7f}".into()];

        let err = config.validate().unwrap_err();
        assert_eq!(err.code_str(), "CLASSSENSE_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_redacted_masks_url() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("DATABASE_URL", "postgres://user:hunter2@db/classsense")]))
            .unwrap();

        let value = config.redacted().unwrap();
        assert_eq!(value["store"]["postgres"]["url"], "<redacted>");
        assert!(!value.to_string().contains("hunter2"));
    }
}
