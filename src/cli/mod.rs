//! CLI module for ClassSense
//!
//! Provides command-line interface for:
//! - serve: Open the class store and run the HTTP server
//! - check-config: Print the resolved configuration
//! - migrate: Apply the PostgreSQL schema

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    check_config, default_config_path, migrate, run, run_command, serve, DEFAULT_CONFIG_FILE,
};
pub use config::Config;
pub use errors::{CliError, CliResult};
pub use io::write_response;
