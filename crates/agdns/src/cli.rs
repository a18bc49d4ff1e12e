//! Clap derive structures for the `agdns` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// agdns -- poll AdGuard DNS and print merged statistics
#[derive(Debug, Parser)]
#[command(
    name = "agdns",
    version,
    about = "Poll the AdGuard DNS API and report DNS filtering statistics",
    long_about = "Fetches account limits, devices, DNS servers, statistics, and the\n\
        query log from the AdGuard DNS public API, merges them into one\n\
        snapshot, and derives block rates, top domains, and protection status.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "AGDNS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "AGDNS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// API root URL (overrides profile)
    #[arg(long, env = "AGDNS_API_URL", global = true)]
    pub api_url: Option<String>,

    /// OAuth token endpoint (overrides profile)
    #[arg(long, env = "AGDNS_TOKEN_URL", global = true)]
    pub token_url: Option<String>,

    /// OAuth refresh token (overrides profile)
    #[arg(long, env = "AGDNS_REFRESH_TOKEN", global = true, hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "AGDNS_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "AGDNS_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one poll cycle and print the snapshot
    #[command(alias = "snap", alias = "s")]
    Snapshot(SnapshotArgs),

    /// Poll on an interval and print every published snapshot
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Delete the remote query log
    ClearLog,

    /// Manage the configuration file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Also list per-device statistics
    #[arg(long, short = 'd')]
    pub devices: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between cycles (60-3600, overrides profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Exit after this many snapshots
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Print the effective configuration (tokens redacted)
    Show,

    /// Write a starter config with one profile
    Init {
        /// Environment variable the profile reads its refresh token from
        #[arg(long, default_value = "AGDNS_REFRESH_TOKEN")]
        refresh_token_env: String,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Store a token for the active profile in the system keyring
    SetToken {
        /// Token value
        token: String,

        /// Store as the access token instead of the refresh token
        #[arg(long)]
        access: bool,
    },
}
