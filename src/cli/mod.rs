//! CLI argument parsing for leasekeeper.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Leasekeeper: lease locks, tag indexing and rate-gated execution over a
/// shared store.
#[derive(Parser, Debug)]
#[command(name = "leasekeeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: $LEASEKEEPER_CONFIG, then ./leasekeeper.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for leasekeeper.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lock management commands.
    Lock(LockCommand),

    /// Tag index commands.
    Tags(TagsCommand),

    /// Run a command through the coordinator.
    ///
    /// Without --frequency-secs the command runs exclusively (at most one
    /// instance at a time). With it, runs are also spaced at least that far
    /// apart across every host sharing the store.
    Run(RunArgs),
}

/// Lock subcommand wrapper.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Show the lock entry for a key: token, expiry, and state.
    Inspect(LockKeyArgs),

    /// Delete the lock entry for a key.
    ///
    /// Requires --force flag to prevent accidental clearing.
    Clear(LockClearArgs),

    /// Acquire a lease, hold it for a while, then release it.
    Hold(LockHoldArgs),
}

/// A lock key argument.
#[derive(Parser, Debug)]
pub struct LockKeyArgs {
    /// Logical key (without the lock prefix).
    pub key: String,
}

/// Arguments for the `lock clear` command.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// Logical key (without the lock prefix).
    pub key: String,

    /// Force clearing the lock (required for safety).
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `lock hold` command.
#[derive(Parser, Debug)]
pub struct LockHoldArgs {
    /// Logical key (without the lock prefix).
    pub key: String,

    /// Lease duration in seconds (default: config default_lease_secs).
    #[arg(long)]
    pub lease_secs: Option<u64>,

    /// How long to hold before releasing.
    #[arg(long, default_value_t = 10)]
    pub hold_secs: u64,

    /// Acquisition budget in milliseconds (default: config acquisition_timeout_ms).
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Tags subcommand wrapper.
#[derive(Parser, Debug)]
pub struct TagsCommand {
    #[command(subcommand)]
    pub action: TagsAction,
}

/// Available tag actions.
#[derive(Subcommand, Debug)]
pub enum TagsAction {
    /// Store a value and tag it.
    Set(TagsSetArgs),

    /// List keys carrying any of the tags.
    Any(TagsQueryArgs),

    /// List keys carrying all of the tags.
    All(TagsQueryArgs),

    /// Prune tag members whose key no longer exists.
    Cleanup,
}

/// Arguments for the `tags set` command.
#[derive(Parser, Debug)]
pub struct TagsSetArgs {
    pub key: String,

    /// JSON value; anything that is not valid JSON is stored as a string.
    pub value: String,

    /// Tag to attach (repeatable).
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Expire the value after this many seconds.
    #[arg(long)]
    pub ttl_secs: Option<u64>,
}

/// Arguments for tag lookups.
#[derive(Parser, Debug)]
pub struct TagsQueryArgs {
    #[arg(required = true, value_name = "TAG")]
    pub tags: Vec<String>,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Stable operation name.
    pub name: String,

    /// Operation argument (repeatable); part of the coordination key.
    #[arg(long = "arg", value_name = "ARG")]
    pub args: Vec<String>,

    /// Lease duration in seconds; must exceed the command's worst-case runtime.
    #[arg(long)]
    pub lease_secs: Option<u64>,

    /// Minimum spacing between runs, in seconds; 0 keeps only mutual exclusion.
    #[arg(long)]
    pub frequency_secs: Option<u64>,

    /// The command to run, after `--`.
    #[arg(last = true, required = true, value_name = "CMD")]
    pub command: Vec<String>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
