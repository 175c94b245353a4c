//! Clap derive structures for the `synctray` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// synctray -- monitor and control a Syncthing daemon
#[derive(Debug, Parser)]
#[command(
    name = "synctray",
    version,
    about = "Monitor and control a Syncthing daemon from the command line",
    long_about = "Connects to a Syncthing daemon over its REST API, follows its event\n\
        stream and reports directory, device and transfer state.",
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
    /// Daemon profile to use
    #[arg(long, short = 'p', env = "SYNCTRAY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Daemon URL (overrides profile)
    #[arg(long, short = 'u', env = "SYNCTRAY_URL", global = true)]
    pub url: Option<String>,

    /// Daemon API key
    #[arg(long, env = "SYNCTRAY_API_KEY", global = true, hide_env = true)]
    pub api_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SYNCTRAY_OUTPUT",
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

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Seconds to wait for the connection to come up
    #[arg(long, env = "SYNCTRAY_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,
}

// ── Value Enums ──────────────────────────────────────────────────────

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
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show connection state, directories and devices
    #[command(alias = "st")]
    Status,

    /// Print the daemon log
    Log,

    /// Rescan a directory
    Rescan(TargetArgs),

    /// Pause a device
    Pause(TargetArgs),

    /// Resume a paused device
    Resume(TargetArgs),

    /// Restart the daemon
    Restart,

    /// Shut the daemon down
    Shutdown,

    /// Block until every directory is idle
    WaitIdle(WaitIdleArgs),

    /// Stream connection events until interrupted
    Watch,

    /// Fetch a QR code (PNG) encoding a text, e.g. a device id
    Qr(QrArgs),

    /// Inspect the configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// A directory or device id, or `--all`.
#[derive(Debug, Args)]
#[command(group = clap::ArgGroup::new("target").required(true))]
pub struct TargetArgs {
    /// Directory or device id
    #[arg(group = "target")]
    pub id: Option<String>,

    /// Apply to every directory or device
    #[arg(long, group = "target")]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct WaitIdleArgs {
    /// Give up after this long (e.g. "30s", "5m")
    #[arg(long, default_value = "10m")]
    pub timeout: humantime::Duration,
}

#[derive(Debug, Args)]
pub struct QrArgs {
    /// Text to encode
    pub text: String,

    /// Output file (stdout when omitted)
    #[arg(long = "out", short = 'O')]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,
    /// Print the effective configuration with secrets redacted
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
