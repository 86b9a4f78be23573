//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// `kplookup` command-line interface for credential lookup
#[derive(Parser)]
#[command(name = "kplookup")]
#[command(author, version, about = "Resolve credential specifiers against a password manager")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "KPLOOKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except secrets
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve one or more specifiers and print their secrets
    #[command(about = "Resolve credential specifiers to their secret values")]
    Get {
        /// Specifiers: a URL, or key=value pairs (url=, login=, name=, group=)
        #[arg(required = true)]
        specifiers: Vec<String>,

        /// Print a JSON object mapping each specifier to its secret
        #[arg(long)]
        json: bool,

        /// Backend protocol (browser or http)
        #[arg(short, long)]
        backend: Option<String>,

        /// Browser-protocol socket path override
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,

        /// HTTP-protocol endpoint override
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,

        /// Identity file override
        #[arg(long, value_name = "PATH")]
        identity_file: Option<PathBuf>,

        /// Bound on connect + pairing, in seconds
        #[arg(long, value_name = "SECS")]
        connect_timeout: Option<u64>,

        /// Bound on a single query, in seconds
        #[arg(long, value_name = "SECS")]
        query_timeout: Option<u64>,
    },

    /// Generate shell completion scripts
    #[command(about = "Generate shell completions for bash, zsh, fish, etc.")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}
