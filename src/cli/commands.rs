//! CLI command implementations
//!
//! `serve` boots the store before binding any listener: a store that cannot
//! be opened is a fatal boot error, never a silent switch to another backend.

use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::info;

use crate::class_store::{open_store, PostgresClassStore, StoreBackend};
use crate::http_server::{ApiState, HttpServer};
use crate::observability::init_logging;

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "classsense.json";

/// Parse process arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve {
            config,
            port,
            api_port,
        } => serve(resolve(config).as_deref(), port, api_port),
        Command::CheckConfig { config } => check_config(resolve(config).as_deref()),
        Command::Migrate { config } => migrate(resolve(config).as_deref()),
    }
}

/// Open the configured store and serve HTTP until interrupted
pub fn serve(config_path: Option<&Path>, port: Option<u16>, api_port: Option<u16>) -> CliResult<()> {
    init_logging();

    let mut config = Config::load(config_path)?;
    if let Some(port) = port {
        config.http.port = port;
    }
    if let Some(api_port) = api_port {
        config.http.api_port = Some(api_port);
    }
    config.validate()?;

    info!(
        backend = config.store.backend.as_str(),
        port = config.http.port,
        api_port = ?config.http.api_port,
        "starting classsense"
    );

    let rt = runtime()?;
    rt.block_on(async move {
        let store = open_store(&config.store)
            .await
            .map_err(|e| CliError::boot_failed(format!("Failed to open class store: {}", e)))?;

        HttpServer::with_state(config.http, ApiState::new(store))
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Print the resolved configuration, database URL masked
pub fn check_config(config_path: Option<&Path>) -> CliResult<()> {
    let config = Config::load(config_path)?;
    write_response(config.redacted()?)
}

/// Apply the PostgreSQL schema and exit
pub fn migrate(config_path: Option<&Path>) -> CliResult<()> {
    init_logging();

    let config = Config::load(config_path)?;
    let pg = match (config.store.backend, config.store.postgres.as_ref()) {
        (StoreBackend::Postgres, Some(pg)) => pg.clone(),
        _ => {
            return Err(CliError::config_error(
                "migrate requires a postgres backend (set DATABASE_URL or store.postgres)",
            ))
        }
    };
    let emotion_limit = config.store.effective_emotion_limit();

    let rt = runtime()?;
    rt.block_on(async move {
        PostgresClassStore::connect(&pg, emotion_limit)
            .await
            .map_err(|e| CliError::boot_failed(format!("Migration failed: {}", e)))
    })?;

    write_response(json!({ "migrated": true }))
}

/// Default config file location when none is given
pub fn default_config_path() -> Option<PathBuf> {
    let path = PathBuf::from(DEFAULT_CONFIG_FILE);
    path.exists().then_some(path)
}

fn resolve(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(default_config_path)
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
}
