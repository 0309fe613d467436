//! # CLI Interface
//!
//! Command-line structure for `banklink-node`, using `clap` derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Banklink host.
///
/// Serves signed payment and login redirects for the configured banks and
/// receives the banks' callbacks.
#[derive(Parser, Debug)]
#[command(
    name = "banklink-node",
    about = "Banklink payment and authentication host",
    version,
    propagate_version = true
)]
pub struct BanklinkNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP host.
    Serve(ServeArgs),
    /// Load the bank settings and keys, print the banks and exit.
    CheckConfig(CheckConfigArgs),
    /// Print the 7-3-1 reference number for a transaction id.
    Reference(ReferenceArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `serve` subcommand.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Bank settings file (TOML). Relative key paths resolve against its
    /// directory.
    #[arg(long, short = 'c', env = "BANKLINK_CONFIG")]
    pub config: PathBuf,

    /// Directory holding the record database.
    #[arg(long, short = 'd', env = "BANKLINK_DATA_DIR", default_value = "./banklink-data")]
    pub data_dir: PathBuf,

    /// Port for the HTTP API and bank callbacks.
    #[arg(long, short = 'p', env = "BANKLINK_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Keep records in memory only. Everything is lost on exit.
    #[arg(long)]
    pub in_memory: bool,

    /// Log output.
    #[arg(long, env = "BANKLINK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Public base URL the banks call back to, e.g. `https://shop.example`.
    ///
    /// Defaults to `http://127.0.0.1:<port>`.
    #[arg(long, env = "BANKLINK_BASE_URL")]
    pub base_url: Option<String>,
}

/// Arguments for the `check-config` subcommand.
#[derive(Parser, Debug)]
pub struct CheckConfigArgs {
    /// Bank settings file (TOML).
    #[arg(long, short = 'c', env = "BANKLINK_CONFIG")]
    pub config: PathBuf,
}

/// Arguments for the `reference` subcommand.
#[derive(Parser, Debug)]
pub struct ReferenceArgs {
    /// Transaction id to extend with a check digit.
    pub number: u64,
}
