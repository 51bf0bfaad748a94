//! Place CLI
//!
//! Runs the canvas server and maintains its data offline.
//!
//! # Commands
//!
//! - `serve` - Run the WebSocket canvas server
//! - `token` - Issue a session token for a user
//! - `user` - Add, list, ban and unban users
//! - `inspect` - Display placement log statistics
//! - `verify` - Check placement log integrity

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Pixel canvas server and tools.
#[derive(Parser)]
#[command(name = "place")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the canvas server (flags override PLACE_* environment variables)
    Serve(commands::serve::ServeArgs),

    /// Issue a session token (secret and expiry from the environment)
    Token {
        /// User directory file
        #[arg(short, long, env = "PLACE_USERS_FILE")]
        users_file: PathBuf,

        /// Name of the user
        name: String,
    },

    /// Manage the user directory
    User {
        /// User directory file
        #[arg(short, long, env = "PLACE_USERS_FILE")]
        users_file: PathBuf,

        #[command(subcommand)]
        action: commands::user::UserAction,
    },

    /// Display placement log statistics
    Inspect {
        /// Placement log directory
        #[arg(env = "PLACE_DATA_DIR")]
        data_dir: PathBuf,

        /// Number of top painters to list
        #[arg(short, long, default_value = "10")]
        top: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify placement log integrity
    Verify {
        /// Placement log directory
        #[arg(env = "PLACE_DATA_DIR")]
        data_dir: PathBuf,
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
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve(args) => commands::serve::run(args)?,
        Commands::Token { users_file, name } => commands::token::run(&users_file, &name)?,
        Commands::User { users_file, action } => commands::user::run(&users_file, action)?,
        Commands::Inspect {
            data_dir,
            top,
            format,
        } => commands::inspect::run(&data_dir, top, &format)?,
        Commands::Verify { data_dir } => commands::verify::run(&data_dir)?,
        Commands::Version => {
            println!("place v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
