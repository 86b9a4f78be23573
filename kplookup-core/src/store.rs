//! Persistent identity storage.
//!
//! An [`Identity`] is the opaque key-material blob a backend hands back
//! after pairing with the manager application. Persisting it lets later
//! process runs re-authenticate without the user approving a new pairing.
//! The store treats the blob as a capability token; its internal layout is
//! backend-defined.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::error::{LookupError, LookupResult};

/// Opaque, backend-defined client key material
///
/// Never logged, redacted in `Debug` output, zeroized on drop via
/// [`secrecy`]. Replaced wholesale when a fresh pairing is required;
/// never mutated in place.
#[derive(Clone)]
pub struct Identity {
    blob: SecretString,
}

impl Identity {
    /// Wraps a serialized identity blob
    #[must_use]
    pub fn from_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: SecretString::from(blob.into()),
        }
    }

    /// Exposes the serialized blob for a backend to interpret or persist
    #[must_use]
    pub fn expose_blob(&self) -> &str {
        self.blob.expose_secret()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity").finish_non_exhaustive()
    }
}

/// File-backed identity store with atomic replacement
///
/// The storage location is supplied by configuration. Reads that fail for
/// any reason are treated as "no prior identity" so that a corrupt or
/// missing file triggers a fresh pairing instead of a hard error.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    /// Creates a store persisting to `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the identity file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the previously persisted identity, if any.
    ///
    /// Returns `None` both when no pairing was ever completed and when the
    /// file cannot be read; the latter is logged at warn level.
    #[must_use]
    pub fn load(&self) -> Option<Identity> {
        match fs::read_to_string(&self.path) {
            Ok(blob) => {
                debug!(path = %self.path.display(), "loaded persisted identity");
                Some(Identity::from_blob(blob))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read identity store; a fresh pairing will be required"
                );
                None
            }
        }
    }

    /// Atomically replaces the persisted identity.
    ///
    /// Writes to a sibling temporary file, restricts permissions to the
    /// owning user, syncs, then renames over the target so a crash
    /// mid-write can never leave a truncated blob.
    ///
    /// # Errors
    /// Returns [`LookupError::StoreIo`] if any step fails. The caller's
    /// in-memory session remains valid regardless.
    pub fn save(&self, identity: &Identity) -> LookupResult<()> {
        let io_err = |source: std::io::Error| LookupError::StoreIo {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp_path = self.tmp_path();
        let mut file = fs::File::create(&tmp_path).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(io_err)?;
        }

        file.write_all(identity.expose_blob().as_bytes())
            .map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        debug!(path = %self.path.display(), "persisted identity");
        Ok(())
    }

    /// Sibling temporary path used during `save`
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map_or_else(|| "identity".into(), std::ffi::OsStr::to_os_string);
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
