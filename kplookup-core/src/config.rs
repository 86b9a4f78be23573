//! Lookup configuration.
//!
//! Everything an operator can vary lives here: which backend protocol to
//! speak, where the identity blob is persisted, endpoint overrides, and
//! the two network-wait bounds. Settings load from a TOML file with full
//! defaults, so a missing file simply means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Application directory under the user config dir
const APP_DIR: &str = "kplookup";

/// Which manager application protocol to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Browser-integration protocol over a local Unix socket
    #[default]
    Browser,
    /// Legacy HTTP protocol over a loopback endpoint
    Http,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "browser" => Ok(Self::Browser),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown backend '{other}' (expected 'browser' or 'http')")),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Browser => write!(f, "browser"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Settings for the credential lookup subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    /// Backend protocol to use
    pub backend: BackendKind,
    /// Identity blob location; defaults to a per-backend file under the
    /// user config dir
    pub identity_file: Option<PathBuf>,
    /// Browser-protocol socket override
    pub socket_path: Option<PathBuf>,
    /// HTTP-protocol endpoint override
    pub endpoint: Option<String>,
    /// Client name announced during pairing
    pub client_id: String,
    /// Bound on connect + pairing, seconds; pairing waits for a human
    pub connect_timeout_secs: u64,
    /// Bound on a single query, seconds
    pub query_timeout_secs: u64,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            identity_file: None,
            socket_path: None,
            endpoint: None,
            client_id: "kplookup".to_string(),
            connect_timeout_secs: 60,
            query_timeout_secs: 10,
        }
    }
}

impl LookupSettings {
    /// Loads settings from `path`, or from the default location when
    /// `path` is `None`. A missing file yields defaults.
    ///
    /// # Errors
    /// [`ConfigError`] when the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = path.map_or_else(Self::default_config_path, Path::to_path_buf);

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file; using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io { path, source: e }),
        };

        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path,
            reason: e.to_string(),
        })
    }

    /// Default configuration file location
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Resolved identity file path, honoring the override.
    ///
    /// The default is per backend so the two protocols never share key
    /// material.
    #[must_use]
    pub fn identity_path(&self) -> PathBuf {
        self.identity_file.clone().unwrap_or_else(|| {
            let file = match self.backend {
                BackendKind::Browser => "browser-identity.json",
                BackendKind::Http => "http-identity.json",
            };
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join(file)
        })
    }

    /// Bound on connect + pairing
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Bound on a single query
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}
