//! Clap derive structures for the `xsync` CLI.
//!
//! Defines the command tree, global flags, and the value enums shared by
//! several subcommands. Also compiled by `build.rs` for man page generation,
//! so it must only depend on clap, clap_complete and humantime.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// xsync -- keep an Xray server's users in step with a desired-state feed
#[derive(Debug, Parser)]
#[command(
    name = "xsync",
    version,
    about = "Reconcile Xray proxy users against a desired-state feed",
    long_about = "Manages the user directory of a running Xray server through its\n\
        HandlerService API.\n\n\
        `sync` fetches the desired user set from a feed and converges every\n\
        inbound group onto it; `add`, `del` and `bulk-add` operate on users\n\
        directly.",
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
    /// Xray API address (host:port), overrides [xray].address
    #[arg(long, short = 'x', global = true)]
    pub xray: Option<String>,

    /// Per-call control-plane timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one record per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProtocolArg {
    Vless,
    Vmess,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Desired set is the full truth; extra users are removed
    Replace,
    /// Only add and update; never remove
    Upsert,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum IdempotencyArg {
    /// Count "already exists" / "not found" separately
    Skip,
    /// Count them as successes
    Success,
    /// Count them as failures
    Fail,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add one user to the target inbounds
    Add(AddArgs),

    /// Remove one user from the target inbounds
    #[command(alias = "rm")]
    Del(DelArgs),

    /// Add every user listed in a CSV file
    BulkAdd(BulkAddArgs),

    /// Reconcile against the desired-state feed, once or periodically
    Sync(SyncArgs),

    /// Inspect and create the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

/// Inbounds to operate on and the state store to keep in step.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Inbound tag (repeat or comma-separate for several)
    #[arg(long = "tag", short = 't', required = true, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// State store file to record the change in
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,
}

/// Retry and idempotency overrides.
#[derive(Debug, Args)]
pub struct PolicyArgs {
    /// How "already exists" / "not found" answers are counted
    #[arg(long)]
    pub idempotency: Option<IdempotencyArg>,

    /// Attempts per control-plane call
    #[arg(long)]
    pub retries: Option<u32>,
}

/// Defaults for fields a user record leaves out.
#[derive(Debug, Args)]
pub struct UserDefaultArgs {
    /// User level
    #[arg(long)]
    pub level: Option<u32>,

    /// VLESS flow (e.g. xtls-rprx-vision)
    #[arg(long)]
    pub flow: Option<String>,
}

// ── Users ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AddArgs {
    /// User identifier (the email on the proxy)
    pub email: String,

    /// Account secret (UUID)
    #[arg(long, short = 'u')]
    pub uuid: String,

    /// Protocol of the target inbounds
    #[arg(long, short = 'p', default_value = "vless")]
    pub proto: ProtocolArg,

    #[command(flatten)]
    pub defaults: UserDefaultArgs,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Debug, Args)]
pub struct DelArgs {
    /// User identifier (the email on the proxy)
    pub email: String,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Debug, Args)]
pub struct BulkAddArgs {
    /// CSV file with rows `email,uuid[,protocol[,level[,flow]]]`
    pub file: PathBuf,

    /// Protocol for rows that leave the protocol column blank
    #[arg(long, short = 'p', default_value = "vless")]
    pub proto: ProtocolArg,

    /// Parallel workers
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,

    #[command(flatten)]
    pub defaults: UserDefaultArgs,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

// ── Sync ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Desired-state feed URL
    #[arg(long)]
    pub feed_url: Option<String>,

    /// Feed token (prefer [feed].token_env in the config file)
    #[arg(long)]
    pub token: Option<String>,

    /// Public ID this server reports to the feed
    #[arg(long)]
    pub server_id: Option<String>,

    /// How users missing from the feed are treated
    #[arg(long)]
    pub mode: Option<ModeArg>,

    /// Re-add every desired user and skip removals for this run
    #[arg(long)]
    pub reseed: bool,

    /// Parallel workers
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,

    /// Attempts per control-plane call
    #[arg(long)]
    pub retries: Option<u32>,

    /// How "already exists" / "not found" answers are counted
    #[arg(long)]
    pub idempotency: Option<IdempotencyArg>,

    /// Repeat every interval until interrupted (e.g. "5m", "30s")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval: Option<std::time::Duration>,

    /// State store base path; one `<db>.<kind>.json` per inbound group
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Directory for raw feed snapshots
    #[arg(long, value_name = "DIR")]
    pub snapshots: Option<PathBuf>,

    #[command(flatten)]
    pub defaults: UserDefaultArgs,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration (token redacted)
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
