//! Command handler modules for the CLI.

mod completions;
mod get;

use std::path::Path;

use crate::cli::Commands;
use crate::error::CliError;

/// Dispatch a CLI command to the appropriate handler.
pub fn dispatch(config_path: Option<&Path>, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Get {
            specifiers,
            json,
            backend,
            socket,
            endpoint,
            identity_file,
            connect_timeout,
            query_timeout,
        } => get::cmd_get(
            config_path,
            get::GetParams {
                specifiers: &specifiers,
                json,
                backend: backend.as_deref(),
                socket: socket.as_deref(),
                endpoint: endpoint.as_deref(),
                identity_file: identity_file.as_deref(),
                connect_timeout,
                query_timeout,
            },
        ),
        Commands::Completions { shell } => completions::cmd_completions(shell),
    }
}
