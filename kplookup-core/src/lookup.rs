//! The credential lookup facade.
//!
//! [`CredentialLookup`] orchestrates parse → session-acquire → query →
//! select and owns the one cached session per process. Pairing and key
//! exchange are orders of magnitude slower than a query, so the session
//! is established lazily on the first resolve and reused by every later
//! one; concurrent resolves block on an in-flight handshake instead of
//! duplicating it, and queries are serialized because neither wire
//! protocol multiplexes.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::backend::{
    BrowserProtocolBackend, CandidateEntry, HTTPProtocolBackend, ManagerBackend, Session,
};
use crate::config::{BackendKind, LookupSettings};
use crate::error::{LookupError, LookupResult};
use crate::selector::select;
use crate::specifier::Specifier;
use crate::store::IdentityStore;

/// Resolves credential specifiers against one manager application
pub struct CredentialLookup {
    backend: Arc<dyn ManagerBackend>,
    store: IdentityStore,
    /// The cached session; `None` until the first resolve establishes it
    session: Mutex<Option<Session>>,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl CredentialLookup {
    /// Creates a facade over an explicit backend and identity store
    #[must_use]
    pub fn new(
        backend: Arc<dyn ManagerBackend>,
        store: IdentityStore,
        connect_timeout: Duration,
        query_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            session: Mutex::new(None),
            connect_timeout,
            query_timeout,
        }
    }

    /// Creates a facade from configuration, constructing the configured
    /// backend adapter.
    #[must_use]
    pub fn from_settings(settings: &LookupSettings) -> Self {
        let backend: Arc<dyn ManagerBackend> = match settings.backend {
            BackendKind::Browser => Arc::new(BrowserProtocolBackend::new(
                settings.socket_path.clone(),
                settings.client_id.clone(),
            )),
            BackendKind::Http => Arc::new(HTTPProtocolBackend::new(settings.endpoint.clone())),
        };
        Self::new(
            backend,
            IdentityStore::new(settings.identity_path()),
            settings.connect_timeout(),
            settings.query_timeout(),
        )
    }

    /// Resolves one specifier to its secret.
    ///
    /// On `SessionExpired` (a stale session left by a long-lived host
    /// process) exactly one reconnect-and-retry runs before the failure
    /// is surfaced. Nothing else is retried: a refused connection or a
    /// malformed peer will not self-heal within one invocation.
    ///
    /// # Errors
    /// Any [`LookupError`]; see the taxonomy on that type.
    #[instrument(skip(self), fields(backend = self.backend.backend_id()))]
    pub async fn resolve(&self, raw: &str) -> LookupResult<SecretString> {
        let specifier = Specifier::parse(raw)?;
        let mut slot = self.session.lock().await;
        let entries = self.query_with_retry(&mut slot, &specifier).await?;
        let entry = select(entries, &specifier)?;
        Ok(entry.password)
    }

    /// Resolves several specifiers over one shared session.
    ///
    /// Fails on the first specifier that cannot be resolved.
    ///
    /// # Errors
    /// As [`Self::resolve`].
    pub async fn resolve_many(&self, raws: &[&str]) -> LookupResult<Vec<SecretString>> {
        let mut secrets = Vec::with_capacity(raws.len());
        for raw in raws {
            secrets.push(self.resolve(raw).await?);
        }
        Ok(secrets)
    }

    async fn query_with_retry(
        &self,
        slot: &mut Option<Session>,
        specifier: &Specifier,
    ) -> LookupResult<Vec<CandidateEntry>> {
        if slot.is_none() {
            *slot = Some(self.establish().await?);
        }
        let Some(session) = slot.as_mut() else {
            return Err(LookupError::Protocol("session slot empty".to_string()));
        };

        match self.query_bounded(session, specifier).await {
            Ok(entries) => Ok(entries),
            Err(LookupError::SessionExpired) => {
                debug!(specifier = %specifier, "session expired; reconnecting once");
                *slot = None;
                let session = slot.insert(self.establish().await?);
                self.query_bounded(session, specifier).await
            }
            Err(e) => Err(e),
        }
    }

    /// Establishes a session, pairing if needed, and persists a freshly
    /// paired identity. A store write failure is logged, not fatal: the
    /// in-memory session stays valid for this process.
    async fn establish(&self) -> LookupResult<Session> {
        let identity = self.store.load();
        let connected = match timeout(self.connect_timeout, self.backend.connect(identity)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(LookupError::PairingTimeout {
                    timeout: self.connect_timeout,
                });
            }
        };

        if connected.freshly_paired {
            if let Err(e) = self.store.save(&connected.identity) {
                warn!(
                    error = %e,
                    "failed to persist identity; re-pairing will be required next run"
                );
            }
        }
        Ok(connected.session)
    }

    async fn query_bounded(
        &self,
        session: &mut Session,
        specifier: &Specifier,
    ) -> LookupResult<Vec<CandidateEntry>> {
        match timeout(self.query_timeout, self.backend.query(session, specifier)).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::QueryTimeout {
                timeout: self.query_timeout,
            }),
        }
    }
}
