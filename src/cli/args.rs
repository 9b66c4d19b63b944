//! Argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// atlas - a transactional, hierarchical task and knowledge store
#[derive(Debug, Parser)]
#[command(name = "atlas", version, about)]
pub struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store directory, overriding config and environment
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Initialise a store directory
    Init,
    /// Run the integrity check and print the report
    Verify,
    /// Fold the WAL into a fresh snapshot
    Checkpoint,
    /// Export a backup now
    Export,
    /// Import a backup file, replacing the store
    Import {
        /// Backup file to import
        file: PathBuf,
    },
    /// Checkpoint plus backup retention sweep
    Vacuum,
    /// Print store, index, cache, and pool statistics
    Stats,
}

impl Cli {
    /// Parse process arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
