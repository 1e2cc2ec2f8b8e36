//! Class store configuration
//!
//! The backend is chosen once at startup and never switched while serving.

use serde::{Deserialize, Serialize};

/// Default emotion log capacity for the in-memory backend
pub const MEMORY_EMOTION_LIMIT: usize = 1_000;

/// Default emotion log capacity for the PostgreSQL backend
pub const POSTGRES_EMOTION_LIMIT: usize = 10_000;

/// Available storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Postgres => "postgres",
        }
    }
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Connection URL (may carry credentials; never logged)
    pub url: String,

    /// `true` requires TLS, `false` disables it, unset leaves the driver default
    #[serde(default)]
    pub ssl: Option<bool>,

    /// Host or socket directory used when the URL has no host
    #[serde(default)]
    pub host: Option<String>,

    /// Pool size (default: 10)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a request waits for a pooled connection (default: 5000)
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ssl: None,
            host: None,
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

/// Class store configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend selection (default: memory)
    #[serde(default)]
    pub backend: StoreBackend,

    /// Emotion log capacity; unset uses the backend default
    #[serde(default)]
    pub emotion_limit: Option<usize>,

    /// Required when `backend` is `postgres`
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
}

impl StoreConfig {
    /// In-memory store with default limits
    pub fn memory() -> Self {
        Self::default()
    }

    /// PostgreSQL store at the given URL
    pub fn postgres(url: impl Into<String>) -> Self {
        Self {
            backend: StoreBackend::Postgres,
            emotion_limit: None,
            postgres: Some(PostgresConfig::new(url)),
        }
    }

    /// Effective emotion log capacity for the selected backend
    pub fn effective_emotion_limit(&self) -> usize {
        self.emotion_limit.unwrap_or(match self.backend {
            StoreBackend::Memory => MEMORY_EMOTION_LIMIT,
            StoreBackend::Postgres => POSTGRES_EMOTION_LIMIT,
        })
    }

    /// Check the settings are usable, returning a human-readable reason if not
    pub fn validate(&self) -> Result<(), String> {
        if self.emotion_limit == Some(0) {
            return Err("emotion_limit must be > 0".to_string());
        }

        if self.backend == StoreBackend::Postgres {
            let pg = self
                .postgres
                .as_ref()
                .ok_or_else(|| "postgres settings are required for the postgres backend".to_string())?;

            if pg.url.trim().is_empty() {
                return Err("postgres.url must not be empty".to_string());
            }
            if pg.max_connections == 0 {
                return Err("postgres.max_connections must be > 0".to_string());
            }
        }

        Ok(())
    }
}
