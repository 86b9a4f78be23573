//! Backend adapters for the supported password manager protocols.
//!
//! Two incompatible wire protocols are normalized to one contract:
//! [`ManagerBackend::connect`] establishes an authenticated session
//! (pairing on first contact) and [`ManagerBackend::query`] retrieves the
//! candidate entries for a specifier URL. Everything above this module is
//! backend-agnostic.
//!
//! - [`BrowserProtocolBackend`] speaks the browser-integration protocol: a
//!   long-lived encrypted session over a local Unix socket, keyed by a
//!   persisted association.
//! - [`HTTPProtocolBackend`] speaks the legacy HTTP protocol: stateless
//!   per-request authenticated exchanges against a loopback endpoint, with
//!   its own persisted key.

mod browser;
mod crypto;
mod http;
mod transport;

pub use browser::{BrowserProtocolBackend, BrowserSession};
pub use crypto::{ChannelCrypto, PlainCrypto, RingChannelCrypto};
pub use http::{HTTPProtocolBackend, HttpSession};
pub use transport::{SocketTransport, Transport, default_socket_path};

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::{LookupError, LookupResult};
use crate::specifier::Specifier;
use crate::store::Identity;

/// One stored secret record returned by a backend query
///
/// Produced fresh on every query; never cached by this subsystem.
#[derive(Clone)]
pub struct CandidateEntry {
    /// Entry title as shown in the manager application
    pub title: String,
    /// Username bound to the entry
    pub username: String,
    /// The secret value
    pub password: SecretString,
    /// URL the entry is registered under
    pub url: String,
    /// Group the entry is stored in, if the backend reports one
    pub group: Option<String>,
}

impl std::fmt::Debug for CandidateEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateEntry")
            .field("title", &self.title)
            .field("username", &self.username)
            .field("url", &self.url)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

/// An active authenticated channel to one manager application
///
/// Valid only for the lifetime of the underlying connection; never reused
/// across process runs. Tagged by backend flavor: presenting a session to
/// the wrong backend is a protocol error, not a panic.
pub enum Session {
    /// Encrypted Unix-socket session (browser protocol)
    Browser(BrowserSession),
    /// Per-request authenticated HTTP exchange state
    Http(HttpSession),
}

/// Outcome of a successful [`ManagerBackend::connect`]
pub struct Connected {
    /// The established session
    pub session: Session,
    /// The identity the session is authenticated under
    pub identity: Identity,
    /// True if a pairing handshake ran and `identity` must be persisted
    pub freshly_paired: bool,
}

/// Common contract of the two manager application adapters
#[async_trait]
pub trait ManagerBackend: Send + Sync {
    /// Stable identifier for logging and configuration
    fn backend_id(&self) -> &'static str;

    /// Establishes an authenticated session.
    ///
    /// If `identity` is absent or the application no longer trusts it, a
    /// pairing handshake runs; the manager application may prompt the user
    /// out of band, so callers bound this with a timeout.
    ///
    /// # Errors
    /// `ConnectionRefused` if no application instance is reachable,
    /// `PairingDenied` if the pairing request is rejected, `Protocol` for
    /// malformed handshake frames.
    async fn connect(&self, identity: Option<Identity>) -> LookupResult<Connected>;

    /// Retrieves the candidate entries whose stored URL matches
    /// `specifier.url` by the application's own matching rules.
    ///
    /// # Errors
    /// `SessionExpired` if the peer closed the channel (the caller should
    /// reconnect once), `Protocol` for malformed response frames.
    async fn query(
        &self,
        session: &mut Session,
        specifier: &Specifier,
    ) -> LookupResult<Vec<CandidateEntry>>;
}

/// Error for a session handed to a backend that did not create it
pub(crate) fn wrong_session(backend_id: &str) -> LookupError {
    LookupError::Protocol(format!(
        "session does not belong to the '{backend_id}' backend"
    ))
}
