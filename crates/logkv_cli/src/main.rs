//! logkv CLI
//!
//! Command-line tools for logkv log directories.
//!
//! # Commands
//!
//! - `get` / `set` / `delete` - Read and write keys
//! - `inspect` - Display segments, sizes and record counts
//! - `verify` - Check every segment for corruption
//! - `dump` - Print segment records for debugging
//! - `compact` - Seal the active segment and compact it

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// logkv command-line tools.
#[derive(Parser)]
#[command(name = "logkv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the value stored under a key
    Get {
        /// Key to look up
        key: String,
    },

    /// Store a value under a key
    Set {
        /// Key to write
        key: String,

        /// Value to store
        value: String,

        /// Store the value as an integer
        #[arg(long)]
        int: bool,

        /// Time-to-live in seconds (stored, not enforced)
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Delete a key
    Delete {
        /// Key to delete
        key: String,
    },

    /// Display segments, sizes and record counts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify every segment can be replayed
    Verify,

    /// Dump segment records for debugging
    Dump {
        /// Only dump this segment id
        #[arg(short, long)]
        segment: Option<u64>,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Seal the active segment and compact it
    Compact {
        /// Dry run - show what would be done
        #[arg(long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Get { key } => {
            let dir = cli.dir.ok_or("Log directory required for get")?;
            commands::kv::get(&dir, &key)?;
        }
        Commands::Set {
            key,
            value,
            int,
            ttl,
        } => {
            let dir = cli.dir.ok_or("Log directory required for set")?;
            commands::kv::set(&dir, key, &value, int, ttl)?;
        }
        Commands::Delete { key } => {
            let dir = cli.dir.ok_or("Log directory required for delete")?;
            commands::kv::delete(&dir, &key)?;
        }
        Commands::Inspect { format } => {
            let dir = cli.dir.ok_or("Log directory required for inspect")?;
            commands::inspect::run(&dir, &format)?;
        }
        Commands::Verify => {
            let dir = cli.dir.ok_or("Log directory required for verify")?;
            commands::verify::run(&dir)?;
        }
        Commands::Dump {
            segment,
            limit,
            format,
        } => {
            let dir = cli.dir.ok_or("Log directory required for dump")?;
            commands::dump::run(&dir, segment, limit, &format)?;
        }
        Commands::Compact { dry_run } => {
            let dir = cli.dir.ok_or("Log directory required for compact")?;
            commands::compact::run(&dir, dry_run)?;
        }
        Commands::Version => {
            println!("logkv CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("logkv core v{}", logkv_core::VERSION);
        }
    }

    Ok(())
}
