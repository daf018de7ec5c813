//! Clap derive structures for the `rivtel` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-level CLI ────────────────────────────────────────────────────

/// rivtel -- real-time Rivian vehicle telemetry from the command line
#[derive(Debug, Parser)]
#[command(
    name = "rivtel",
    version,
    about = "Watch, query, and export Rivian vehicle telemetry",
    long_about = "A client for the Rivian vehicle-data gateway.\n\n\
        Streams live vehicle state over a GraphQL subscription (with\n\
        automatic polling fallback), keeps an append-only local history,\n\
        and exports snapshots in several formats.",
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

// ── Global options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account email
    #[arg(long, short = 'e', env = "RIVTEL_EMAIL", global = true)]
    pub email: Option<String>,

    /// Vehicle index, 0-based
    #[arg(long, env = "RIVTEL_VEHICLE", global = true)]
    pub vehicle: Option<usize>,

    /// Snapshot database path
    #[arg(long, env = "RIVTEL_DB_PATH", global = true)]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', env = "RIVTEL_QUIET", global = true)]
    pub quiet: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Machine-readable JSON (see --pretty)
    Json,
    /// YAML
    Yaml,
    /// CSV with a fixed column set
    Csv,
    /// Human-readable text (default)
    Text,
    /// Compact row table
    Table,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage authentication and cached tokens
    Auth(AuthArgs),

    /// List the account's vehicles
    #[command(alias = "ls")]
    Vehicles,

    /// Show the current vehicle state
    Status {
        /// Read the newest locally stored snapshot instead of the API
        #[arg(long)]
        offline: bool,
    },

    /// Stream live state updates (subscription with polling fallback)
    Watch {
        /// Poll on a fixed interval (e.g. 30s, 5m) instead of subscribing
        #[arg(long, env = "RIVTEL_POLL_INTERVAL")]
        interval: Option<String>,
    },

    /// Export historical snapshots from the local store
    Export {
        /// Start of the window: RFC 3339 instant or an age like 24h
        #[arg(long)]
        since: Option<String>,

        /// End of the window: RFC 3339 instant or an age like 2h
        #[arg(long)]
        until: Option<String>,

        /// Maximum number of records
        #[arg(long, short = 'l')]
        limit: Option<usize>,
    },

    /// Inspect and maintain the snapshot store
    Store(StoreArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Auth ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Log in with email + password (and a one-time code when required)
    Login,

    /// Show cached-credential status
    Status,

    /// Delete cached credentials
    Logout,
}

// ── Store ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StoreArgs {
    #[command(subcommand)]
    pub command: StoreCommand,
}

#[derive(Debug, Subcommand)]
pub enum StoreCommand {
    /// Row counts, timestamp bounds, and file size
    Stats,

    /// Delete snapshots older than the given age
    Prune {
        /// Age cutoff, e.g. 30d, 720h
        #[arg(long)]
        older_than: String,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
