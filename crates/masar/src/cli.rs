//! Clap derive structures for the `masar` CLI.
//!
//! Defines the command tree, global flags, and shared types. Kept free of
//! workspace dependencies so `build.rs` can include it for man pages.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// masar -- browse, take, and save machine snapshots
#[derive(Debug, Parser)]
#[command(
    name = "masar",
    version,
    about = "Work with MASAR save/restore services from the command line",
    long_about = "Browse configuration sets and their snapshots, take new snapshots,\n\
        and save them with a comment. Talks to MASAR services through an\n\
        RPC gateway over WebSocket.",
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
    /// Gateway profile to use
    #[arg(long, short = 'p', env = "MASAR_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Gateway URL (overrides profile)
    #[arg(long, short = 'g', env = "MASAR_GATEWAY", global = true)]
    pub gateway: Option<String>,

    /// Service endpoint to select (defaults to the profile's first)
    #[arg(long, short = 's', env = "MASAR_SERVICE", global = true)]
    pub service: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "MASAR_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "MASAR_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List or add service endpoints
    #[command(alias = "svc")]
    Services(ServicesArgs),

    /// List base levels (systems) of the selected service
    #[command(alias = "bl")]
    BaseLevels,

    /// List configuration sets
    Sets(SetsArgs),

    /// List snapshots of a configuration set, newest first
    #[command(alias = "snap")]
    Snapshots(SnapshotsArgs),

    /// Search snapshots across all configuration sets
    Find(FindArgs),

    /// Show the values captured in a snapshot
    Show(ShowArgs),

    /// Take a snapshot of a configuration set, optionally saving it
    Take(TakeArgs),

    /// List the process variables of a configuration set
    Contents(ContentsArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Services ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServicesArgs {
    #[command(subcommand)]
    pub command: ServicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ServicesCommand {
    /// List known services and mark the selected one
    #[command(alias = "ls")]
    List,

    /// Connect to a new service and remember it in the active profile
    Add {
        /// Service endpoint name
        name: String,
    },
}

// ── Configuration sets ───────────────────────────────────────────────

/// Restrict a lookup to one base level.
#[derive(Debug, Args)]
pub struct BaseLevelArg {
    /// Base level (system) name; omit for all
    #[arg(long, short = 'b')]
    pub base_level: Option<String>,
}

#[derive(Debug, Args)]
pub struct SetsArgs {
    #[command(flatten)]
    pub base_level: BaseLevelArg,
}

#[derive(Debug, Args)]
pub struct SnapshotsArgs {
    /// Configuration set name
    pub set: String,

    #[command(flatten)]
    pub base_level: BaseLevelArg,
}

#[derive(Debug, Args)]
pub struct ContentsArgs {
    /// Configuration set name
    pub set: String,

    #[command(flatten)]
    pub base_level: BaseLevelArg,
}

// ── Snapshots ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct FindArgs {
    /// Text to search for
    pub expression: String,

    /// Match the expression against the snapshot owner
    #[arg(long)]
    pub by_user: bool,

    /// Match the expression against the snapshot comment
    #[arg(long)]
    pub by_comment: bool,

    /// Only snapshots created at or after this time
    /// (e.g., "2024-03-01" or "2024-03-01 08:00:00")
    #[arg(long)]
    pub start: Option<String>,

    /// Only snapshots created at or before this time
    #[arg(long)]
    pub end: Option<String>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Configuration set name
    pub set: String,

    /// Event id of the snapshot
    pub event_id: String,

    #[command(flatten)]
    pub base_level: BaseLevelArg,
}

#[derive(Debug, Args)]
pub struct TakeArgs {
    /// Configuration set name
    pub set: String,

    #[command(flatten)]
    pub base_level: BaseLevelArg,

    /// Save the snapshot after taking it
    #[arg(long, requires = "comment")]
    pub save: bool,

    /// Comment stored with a saved snapshot
    #[arg(long, short = 'm')]
    pub comment: Option<String>,

    /// User recorded on a saved snapshot (overrides profile)
    #[arg(long, short = 'u', env = "MASAR_USER")]
    pub user: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current resolved configuration
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
