//! fuelkv CLI
//!
//! Read-only inspection of mapped and relational store files.
//!
//! # Commands
//!
//! - `inspect` - Display file size, header fields or tables
//! - `get` - Print the value stored under a key
//! - `keys` - List keys
//! - `tables` - List tables of a relational store

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// fuelkv command-line store tools.
#[derive(Parser)]
#[command(name = "fuelkv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Treat the file as a relational store instead of detecting the backend
    #[arg(global = true, short, long)]
    relational: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics and metadata
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the value stored under a key
    Get {
        /// Key to look up
        key: String,

        /// Table to read from (relational stores)
        #[arg(short, long)]
        table: Option<String>,
    },

    /// List keys
    Keys {
        /// Table to list (relational stores)
        #[arg(short, long)]
        table: Option<String>,

        /// Maximum number of keys to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List tables of a relational store
    Tables,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

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
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, cli.relational, &format)?;
        }
        Commands::Get { key, table } => {
            let path = cli.path.ok_or("Store path required for get")?;
            commands::get::run(&path, cli.relational, &key, table.as_deref())?;
        }
        Commands::Keys { table, limit } => {
            let path = cli.path.ok_or("Store path required for keys")?;
            commands::keys::run(&path, cli.relational, table.as_deref(), limit)?;
        }
        Commands::Tables => {
            let path = cli.path.ok_or("Store path required for tables")?;
            commands::tables::run(&path)?;
        }
        Commands::Version => {
            println!("fuelkv CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("fuelkv Core v{}", fuelkv_core::VERSION);
        }
    }

    Ok(())
}
