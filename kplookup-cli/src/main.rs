//! `kplookup` CLI - resolve credential specifiers against a locally
//! running password manager.
//!
//! Provides commands for resolving one or more specifiers to their
//! secret values and for generating shell completions.

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::Cli;

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    if !cli.quiet {
        kplookup_core::trace::init_tracing(cli.verbose);
    }

    let result = commands::dispatch(config_path, cli.command);

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
