//! CLI parse: clap types for buildhook. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// buildhook - premerge build status cache and coordinator notifier
#[derive(Parser)]
#[command(name = "buildhook")]
#[command(about = "Premerge build status cache and build coordinator notifier")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (config/ and relative cache paths live here)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a branch to its build, queueing one if needed
    Resolve {
        /// Branch name or revision
        #[arg(long)]
        branch: String,
        /// Author recorded on the change
        #[arg(long, default_value = "")]
        author: String,
        /// Ticket the branch belongs to
        #[arg(long)]
        ticket: Option<u64>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Record a build result
    SetStatus {
        /// Commit the result belongs to
        sha: String,
        #[arg(long)]
        builder: String,
        #[arg(long)]
        number: i64,
        /// -1 in progress, 0..5 Success/Warnings/Failure/Skipped/Exception/Retry
        #[arg(long, allow_hyphen_values = true)]
        status: i32,
        /// Identity to act as
        #[arg(long = "as", default_value = "anonymous")]
        as_identity: String,
    },
    /// Show cached build records
    Show {
        /// Commit to show; all rows when omitted
        sha: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Drop the whole build cache
    Purge,
}

impl Commands {
    /// Stable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Resolve { .. } => "resolve",
            Commands::SetStatus { .. } => "set-status",
            Commands::Show { .. } => "show",
            Commands::Purge => "purge",
        }
    }
}
