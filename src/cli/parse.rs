//! CLI parse: clap types for notebook-refresh. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// notebook-refresh - actor notebook generation scheduler
#[derive(Parser)]
#[command(name = "notebook-refresh")]
#[command(about = "Schedule and inspect threat-actor notebook refreshes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the build and enrichment workers and the auto-refresh driver until Ctrl-C
    Serve {
        /// Do not start the auto-refresh driver even if enabled in config
        #[arg(long)]
        no_auto_refresh: bool,
    },
    /// Manage actor profiles
    Actor {
        #[command(subcommand)]
        command: ActorCommands,
    },
    /// Run one stale-run recovery pass
    Recover,
    /// Show which actors the next auto-refresh iteration would queue (no writes)
    Eligible {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show recent runs, average duration and ETA for an actor
    Timeline {
        /// Actor ID
        actor_id: String,
    },
    /// Show one generation job with its phases
    Job {
        /// Actor ID
        actor_id: String,
        /// Job ID
        job_id: String,
    },
}

#[derive(Subcommand)]
pub enum ActorCommands {
    /// Create or update an actor profile
    Add {
        /// Actor ID
        actor_id: String,
        /// Display name (defaults to the ID)
        #[arg(long)]
        name: Option<String>,
        /// Include the actor in auto-refresh
        #[arg(long)]
        tracked: bool,
    },
    /// List actor profiles with their refresh state
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}
