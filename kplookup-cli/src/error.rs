//! CLI error types and exit codes.

use kplookup_core::error::{ConfigError, LookupError};

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - bad specifier, configuration, ambiguity, or no match
    pub const GENERAL_ERROR: i32 = 1;
    /// Connection failure - the password manager was unreachable, denied
    /// pairing, or stopped answering
    pub const CONNECTION_FAILURE: i32 = 2;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Lookup error
    #[error("{0}")]
    Lookup(#[from] LookupError),

    /// Invalid command-line value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, malformed specifier, no match,
    ///   ambiguity, IO)
    /// - 2: Connection failure (manager unreachable, pairing denied or
    ///   timed out, session lost)
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Lookup(e) if e.is_connection_failure() => exit_codes::CONNECTION_FAILURE,
            Self::Lookup(_) | Self::Config(_) | Self::InvalidArgument(_) | Self::Io(_) => {
                exit_codes::GENERAL_ERROR
            }
        }
    }
}
