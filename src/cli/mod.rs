//! CLI module for netweave
//!
//! Operator tooling around the reconciliation core. Nothing here talks to
//! live devices; commands run against the configuration and an in-memory
//! platform.
//!
//! # Commands
//!
//! - `pools` - Declare configured pools and show their usage
//! - `validate` - Validate an intent document offline
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Show pool usage, restoring allocations from a snapshot
//! netweave pools --state pools.json
//!
//! # Check an intent before submitting it
//! netweave validate link-42.json
//!
//! # Generate shell completions
//! netweave completions bash > ~/.bash_completion.d/netweave
//! ```

pub mod completions;
pub mod config;
pub mod output;
pub mod pools;
pub mod validate;

pub use completions::handle_completions;
pub use config::handle_config_init;
pub use pools::handle_pools;
pub use validate::handle_validate;

use crate::config::{LoggingConfig, NetweaveConfig};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// netweave - intent-based network reconciliation
#[derive(Parser, Debug)]
#[command(
    name = "netweave",
    version,
    about = "Intent-based network reconciliation toolkit"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show resource pool usage
    Pools(PoolsArgs),
    /// Validate an intent document
    Validate(ValidateArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

impl Commands {
    /// Configuration file the command reads, if any.
    pub fn config_path(&self) -> Option<&Path> {
        match self {
            Commands::Pools(args) => Some(args.config.as_path()),
            Commands::Validate(args) => args.config.as_deref(),
            Commands::Config(_) | Commands::Completions(_) => None,
        }
    }

    /// `[logging]` of the command's configuration file.
    ///
    /// Commands without a readable file log warnings only; load errors are
    /// reported by the command itself.
    pub fn logging_config(&self) -> LoggingConfig {
        self.config_path()
            .and_then(|path| NetweaveConfig::load(Some(path)).ok())
            .map(|config| config.logging)
            .unwrap_or_else(|| LoggingConfig {
                level: "warn".to_string(),
                ..LoggingConfig::default()
            })
    }
}

#[derive(Args, Debug)]
pub struct PoolsArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "netweave.toml", env = "NETWEAVE_CONFIG")]
    pub config: PathBuf,

    /// Pool snapshot (JSON) to restore allocations from
    #[arg(short, long)]
    pub state: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Intent document (JSON)
    pub file: PathBuf,

    /// Path to configuration file; defaults are used when omitted
    #[arg(short, long, env = "NETWEAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "netweave.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
