//! Error types for the credential lookup subsystem.
//!
//! All lookup failures are carried by [`LookupError`]. The taxonomy is
//! deliberately flat: callers match on the kind to decide between retrying
//! with a refined specifier (`NoMatch`, `AmbiguousMatch`), fixing their
//! environment (`ConnectionRefused`, `PairingDenied`), or reporting a bug
//! (`Protocol`).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while resolving a credential specifier
#[derive(Debug, Error)]
pub enum LookupError {
    /// The specifier string could not be parsed
    #[error("malformed specifier '{specifier}': {reason}")]
    MalformedSpecifier {
        /// The raw specifier as given by the caller
        specifier: String,
        /// Why parsing failed
        reason: String,
    },

    /// No password manager is listening at the configured endpoint
    #[error("connection refused at {endpoint}; check that the password manager is running and the database is unlocked")]
    ConnectionRefused {
        /// Socket path or URL that was tried
        endpoint: String,
    },

    /// The user or the manager application rejected the pairing request
    #[error("pairing request was denied by the password manager; approve the association prompt and retry")]
    PairingDenied,

    /// No pairing approval arrived within the configured wait
    #[error("no pairing approval within {timeout:?}; approve the association prompt in the password manager")]
    PairingTimeout {
        /// The bound that elapsed
        timeout: Duration,
    },

    /// The peer closed the authenticated channel
    #[error("session was closed by the password manager")]
    SessionExpired,

    /// A malformed or unexpected response frame was received
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A query did not complete within the configured wait
    #[error("query timed out after {timeout:?}")]
    QueryTimeout {
        /// The bound that elapsed
        timeout: Duration,
    },

    /// The query matched no stored entry
    #[error("no entry matches '{specifier}'")]
    NoMatch {
        /// The specifier that was being resolved
        specifier: String,
    },

    /// The query matched several entries with differing secrets
    #[error(
        "{count} entries match '{specifier}' with differing secrets; \
         narrow the lookup with login=, name= or group= \
         (titles: {titles:?}, groups: {groups:?})"
    )]
    AmbiguousMatch {
        /// The specifier that was being resolved
        specifier: String,
        /// How many entries remained after narrowing
        count: usize,
        /// Distinct titles among the remaining entries
        titles: Vec<String>,
        /// Distinct groups among the remaining entries
        groups: Vec<String>,
    },

    /// The identity store could not be read or written
    ///
    /// Read failures are downgraded to "no prior identity" by the store;
    /// write failures are surfaced but do not invalidate an established
    /// in-memory session.
    #[error("identity store I/O error at {path}: {source}")]
    StoreIo {
        /// The identity file that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl LookupError {
    /// Returns true if the error indicates the cached session is stale
    /// and a single reconnect-and-retry is warranted.
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns true for failures caused by the manager application being
    /// unreachable or unwilling, as opposed to caller mistakes.
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionRefused { .. }
                | Self::PairingDenied
                | Self::PairingTimeout { .. }
                | Self::SessionExpired
                | Self::QueryTimeout { .. }
        )
    }
}

/// Result type alias for lookup operations
pub type LookupResult<T> = Result<T, LookupError>;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        /// The configuration file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed as TOML
    #[error("failed to parse configuration at {path}: {reason}")]
    Parse {
        /// The configuration file path
        path: PathBuf,
        /// TOML parse error text
        reason: String,
    },
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
