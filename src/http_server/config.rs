//! HTTP Server Configuration
//!
//! Configuration for the HTTP server including host, ports, and CORS settings.

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Main listener port (default: 4227)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional second listener serving the same API
    #[serde(default)]
    pub api_port: Option<u16>,

    /// CORS allowed origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4227
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_port: None,
            cors_origins: Vec::new(),
        }
    }
}

impl HttpServerConfig {
    /// Create a new config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Address of the API-only listener, if one is configured on a distinct port
    pub fn api_socket_addr(&self) -> Option<String> {
        self.api_port
            .filter(|p| *p != self.port)
            .map(|p| format!("{}:{}", self.host, p))
    }

    /// Every CORS origin must be usable as a header value
    pub fn validate(&self) -> Result<(), String> {
        match self
            .cors_origins
            .iter()
            .find(|origin| HeaderValue::from_str(origin).is_err())
        {
            Some(bad) => Err(format!("invalid CORS origin: {:?}", bad)),
            None => Ok(()),
        }
    }
}
