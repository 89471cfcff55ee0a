//! CLI interface for JSD.
//!
//! Serves a definition tree over HTTP, checks trees offline, and calls
//! remote services from the command line.

mod commands;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;
pub use utils::*;

#[derive(Parser)]
#[command(name = "jsd")]
#[command(about = "JSON Service Definition server and client for JSON-RPC 2.0 services")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Load a definition tree and serve it over HTTP
    Serve {
        /// Address to bind, e.g. 0.0.0.0:8080
        #[arg(long, short = 'b')]
        bind: Option<String>,

        /// Directory holding .jsd definitions and .json schemas
        #[arg(long, short = 'r')]
        root: Option<PathBuf>,

        /// Directory of static files served on GET
        #[arg(long, short = 'p')]
        public: Option<PathBuf>,

        /// Path to a custom configuration file (TOML format)
        #[arg(long, short = 'c')]
        config_path: Option<PathBuf>,
    },

    /// Load and cross-check a definition tree without serving it
    Check {
        #[arg(long, short = 'r')]
        root: Option<PathBuf>,
    },

    /// Call a method on a remote service
    Call {
        /// Service endpoint, e.g. /lighting/lightSimple
        endpoint: String,

        /// Method name declared by the service
        method: String,

        /// Inline JSON argument
        #[arg(long, short = 'j', conflicts_with = "arg_file")]
        arg_json: Option<String>,

        /// File holding the JSON argument
        #[arg(long, short = 'f', conflicts_with = "arg_json")]
        arg_file: Option<PathBuf>,

        /// Server URL prefix, e.g. http://localhost:8080
        #[arg(long)]
        remote_root: Option<String>,

        /// Timeout for each fetch and call in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Skip validating the result against its schema
        #[arg(long)]
        no_validate_result: bool,
    },

    /// Initialize default configuration at default location
    Init {
        #[arg(long)]
        force: bool,
    },

    /// Manage configuration
    Config {
        #[arg(long)]
        show: bool,

        #[arg(long)]
        validate: bool,
    },

    /// Show version information
    Version,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let config = self.config;

        match self.command {
            Commands::Serve {
                bind,
                root,
                public,
                config_path,
            } => serve(bind, root, public, config_path.or(config)).await,

            Commands::Check { root } => check(root, config).await,

            Commands::Call {
                endpoint,
                method,
                arg_json,
                arg_file,
                remote_root,
                timeout_ms,
                no_validate_result,
            } => {
                call(
                    CallOptions {
                        endpoint,
                        method,
                        arg_json,
                        arg_file,
                        remote_root,
                        timeout_ms,
                        validate_result: !no_validate_result,
                    },
                    config,
                )
                .await
            }

            Commands::Init { force } => init(force, config).await,
            Commands::Config { show, validate } => config_command(show, validate, config).await,

            Commands::Version => version().await,
        }
    }
}
