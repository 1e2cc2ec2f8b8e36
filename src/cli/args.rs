//! CLI argument definitions using clap
//!
//! Commands:
//! - classsense serve [--config <path>] [--port <port>] [--api-port <port>]
//! - classsense check-config [--config <path>]
//! - classsense migrate [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ClassSense - classroom feedback collection service
#[derive(Parser, Debug)]
#[command(name = "classsense")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Path to JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Main listener port (overrides config and WEB_PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Second API-only listener port (overrides config and API_PORT)
        #[arg(long)]
        api_port: Option<u16>,
    },

    /// Print the resolved configuration and exit
    CheckConfig {
        /// Path to JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Apply PostgreSQL schema migrations and exit
    Migrate {
        /// Path to JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_ports() {
        let cli = Cli::try_parse_from(["classsense", "serve", "--port", "8080", "--api-port", "8081"])
            .unwrap();
        match cli.command {
            Command::Serve {
                config,
                port,
                api_port,
            } => {
                assert!(config.is_none());
                assert_eq!(port, Some(8080));
                assert_eq!(api_port, Some(8081));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_check_config() {
        let cli = Cli::try_parse_from(["classsense", "check-config", "--config", "cs.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::CheckConfig { config: Some(_) }
        ));
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Cli::try_parse_from(["classsense", "serve", "--port", "70000"]).is_err());
    }
}
