mod app;
mod config;
mod fuzzy;
mod ssh;

use anyhow::Result;
use app::{AppState, Message};
use clap::{Parser, Subcommand};
use config::Config;
use ssh::{ErrorKind, HostsError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Manage SSH known_hosts files
#[derive(Parser)]
#[command(name = "khm", version, about)]
struct Cli {
    /// Path to known_hosts file (overrides SSH_KNOWN_HOSTS and the config file)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all known hosts
    List {
        /// List the stash file instead of known_hosts
        #[arg(long)]
        stash: bool,

        /// Path to stash file (default: stash_hosts next to known_hosts)
        #[arg(short, long, requires = "stash")]
        stash_file: Option<PathBuf>,
    },

    /// Show every key stored for an address
    Show {
        /// Host name, IP or hashed token
        address: String,
    },

    /// Fuzzy search indexed addresses
    Find {
        query: String,
    },

    /// Delete all keys for a host from known_hosts
    Delete {
        address: String,
    },

    /// Remove one key for a host, by its position in `show` output
    Remove {
        address: String,
        position: usize,
    },

    /// Move keys for a host into another file
    Move {
        address: String,
        target: PathBuf,

        /// Only move the key at this position
        #[arg(long)]
        index: Option<usize>,
    },

    /// Stash all keys for a host into a stash file
    Stash {
        address: String,

        /// Path to stash file (default: stash_hosts next to known_hosts)
        #[arg(short, long)]
        stash_file: Option<PathBuf>,
    },

    /// Restore stashed keys for a host into known_hosts
    Unstash {
        address: String,

        /// Path to stash file (default: stash_hosts next to known_hosts)
        #[arg(short, long)]
        stash_file: Option<PathBuf>,
    },

    /// Create a timestamped backup of the known_hosts file
    Backup,

    /// Write the normalized known_hosts contents to another file
    Export {
        path: PathBuf,
    },

    /// Write a default configuration file
    InitConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Exit codes: 1 general failure, 2 bad path or argument, 3 host or file not found.
fn exit_code_for(error: &anyhow::Error) -> u8 {
    let kind = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<HostsError>())
        .map(HostsError::kind);

    match kind {
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::InvalidPath) => 2,
        _ => 1,
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("KHM_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::List {
        stash: false,
        stash_file: None,
    });

    let (message, stash_flag) = match command {
        Commands::List { stash: false, .. } => (Message::List, None),
        Commands::List {
            stash: true,
            stash_file,
        } => (Message::ListStash, stash_file),
        Commands::Show { address } => (Message::Show { address }, None),
        Commands::Find { query } => (Message::Find { query }, None),
        Commands::Delete { address } => (Message::Delete { address }, None),
        Commands::Remove { address, position } => (Message::Remove { address, position }, None),
        Commands::Move {
            address,
            target,
            index,
        } => (
            Message::Move {
                address,
                target,
                position: index,
            },
            None,
        ),
        Commands::Stash {
            address,
            stash_file,
        } => (Message::Stash { address }, stash_file),
        Commands::Unstash {
            address,
            stash_file,
        } => (Message::Unstash { address }, stash_file),
        Commands::Backup => (Message::Backup, None),
        Commands::Export { path } => (Message::Export { path }, None),
        Commands::InitConfig => return init_config(cli.config),
    };

    let config = Config::load(cli.config.as_deref())?;
    let known_hosts_path = config.known_hosts_path(cli.file.as_deref());
    let stash_path = config.stash_path(stash_flag.as_deref());
    tracing::debug!(
        "Using known_hosts at {} (stash: {:?})",
        known_hosts_path.display(),
        stash_path
    );

    let mut app = AppState::new(config, known_hosts_path, stash_path);
    for line in app.update(message)? {
        println!("{line}");
    }

    Ok(())
}

fn init_config(config: Option<PathBuf>) -> Result<()> {
    let path = match config {
        Some(path) => path,
        None => Config::default_config_path()?,
    };
    Config::save_default_config(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
