//! Legacy HTTP protocol backend.
//!
//! The older manager application flavor publishes a loopback HTTP endpoint
//! instead of a socket. There is no long-lived channel: every request is
//! authenticated on its own by a verifier encrypted under a persisted
//! symmetric key that was exchanged once during association.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{LookupError, LookupResult};
use crate::specifier::Specifier;
use crate::store::Identity;

use super::crypto::{ChannelCrypto, RingChannelCrypto};
use super::{CandidateEntry, Connected, ManagerBackend, Session, wrong_session};

/// Default endpoint published by the manager application's HTTP plugin
pub(crate) const DEFAULT_ENDPOINT: &str = "http://localhost:19455/";

const TEST_ASSOCIATE: &str = "test-associate";
const ASSOCIATE: &str = "associate";
const GET_LOGINS: &str = "get-logins";

/// Persisted association, serialized into the opaque identity blob
#[derive(Debug, Serialize, Deserialize)]
struct HttpAssociation {
    id: String,
    key: String,
}

impl HttpAssociation {
    fn from_identity(identity: &Identity) -> Option<Self> {
        serde_json::from_str(identity.expose_blob()).ok()
    }

    fn to_identity(&self) -> LookupResult<Identity> {
        let blob = serde_json::to_string(self)
            .map_err(|e| LookupError::Protocol(format!("failed to serialize identity: {e}")))?;
        Ok(Identity::from_blob(blob))
    }
}

/// Response envelope shared by all request types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HttpReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    entries: Vec<HttpWireEntry>,
}

/// Entry fields arrive encrypted under the association key
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HttpWireEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    login: String,
    #[serde(default)]
    password: String,
}

/// State for per-request authenticated exchanges
pub struct HttpSession {
    client: reqwest::Client,
    endpoint: String,
    assoc: HttpAssociation,
    crypto: Box<dyn ChannelCrypto>,
}

impl HttpSession {
    /// Builds the `Nonce`/`Verifier` pair proving key possession
    fn auth_fields(&self) -> LookupResult<(String, String)> {
        let nonce = self.crypto.nonce();
        let verifier = self.crypto.encrypt(nonce.as_bytes(), &nonce)?;
        Ok((nonce, verifier))
    }

    async fn post(&self, body: &Value) -> LookupResult<HttpReply> {
        post(&self.client, &self.endpoint, body).await
    }
}

async fn post(
    client: &reqwest::Client,
    endpoint: &str,
    body: &Value,
) -> LookupResult<HttpReply> {
    let response = client.post(endpoint).json(body).send().await.map_err(|e| {
        if e.is_connect() {
            LookupError::ConnectionRefused {
                endpoint: endpoint.to_string(),
            }
        } else {
            LookupError::Protocol(format!("request to {endpoint} failed: {e}"))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(LookupError::Protocol(format!(
            "peer answered {status} at {endpoint}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| LookupError::Protocol(format!("response is not valid JSON: {e}")))
}

/// Adapter for the legacy HTTP protocol
pub struct HTTPProtocolBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HTTPProtocolBackend {
    /// Creates a backend for the given endpoint, falling back to the
    /// plugin's default loopback URL.
    #[must_use]
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        }
    }

    /// Returns the endpoint this backend posts to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Verifies an existing association with a `test-associate` request
    async fn test_associate(
        &self,
        crypto: &dyn ChannelCrypto,
        assoc: &HttpAssociation,
    ) -> LookupResult<bool> {
        let nonce = crypto.nonce();
        let verifier = crypto.encrypt(nonce.as_bytes(), &nonce)?;
        let body = json!({
            "RequestType": TEST_ASSOCIATE,
            "TriggerUnlock": false,
            "Id": assoc.id,
            "Nonce": nonce,
            "Verifier": verifier,
        });
        let reply = post(&self.client, &self.endpoint, &body).await?;
        Ok(reply.success)
    }

    /// Pairing: sends the freshly generated key; the manager application
    /// prompts the user before answering (the caller bounds the wait).
    async fn associate(&self, crypto: &dyn ChannelCrypto, key: &str) -> LookupResult<HttpAssociation> {
        let nonce = crypto.nonce();
        let verifier = crypto.encrypt(nonce.as_bytes(), &nonce)?;
        let body = json!({
            "RequestType": ASSOCIATE,
            "Key": key,
            "Nonce": nonce,
            "Verifier": verifier,
        });
        let reply = post(&self.client, &self.endpoint, &body).await?;
        if !reply.success {
            return Err(LookupError::PairingDenied);
        }
        let id = reply
            .id
            .ok_or_else(|| LookupError::Protocol("associate reply carries no id".to_string()))?;
        debug!(%id, "pairing completed");
        Ok(HttpAssociation {
            id,
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl ManagerBackend for HTTPProtocolBackend {
    fn backend_id(&self) -> &'static str {
        "http"
    }

    async fn connect(&self, identity: Option<Identity>) -> LookupResult<Connected> {
        let mut crypto = RingChannelCrypto::new()?;

        if let Some(assoc) = identity.as_ref().and_then(HttpAssociation::from_identity) {
            crypto.adopt_key(&assoc.key)?;
            if self.test_associate(&crypto, &assoc).await? {
                debug!(id = %assoc.id, "existing association accepted");
                let identity = assoc.to_identity()?;
                let session = HttpSession {
                    client: self.client.clone(),
                    endpoint: self.endpoint.clone(),
                    assoc,
                    crypto: Box::new(crypto),
                };
                return Ok(Connected {
                    session: Session::Http(session),
                    identity,
                    freshly_paired: false,
                });
            }
            warn!("existing association rejected; pairing afresh");
            crypto = RingChannelCrypto::new()?;
        }

        let key = crypto.random_key();
        crypto.adopt_key(&key)?;
        let assoc = self.associate(&crypto, &key).await?;
        let identity = assoc.to_identity()?;
        let session = HttpSession {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            assoc,
            crypto: Box::new(crypto),
        };
        Ok(Connected {
            session: Session::Http(session),
            identity,
            freshly_paired: true,
        })
    }

    async fn query(
        &self,
        session: &mut Session,
        specifier: &Specifier,
    ) -> LookupResult<Vec<CandidateEntry>> {
        let session = match session {
            Session::Http(session) => session,
            Session::Browser(_) => return Err(wrong_session(self.backend_id())),
        };

        let (nonce, verifier) = session.auth_fields()?;
        let body = json!({
            "RequestType": GET_LOGINS,
            "Id": session.assoc.id,
            "Nonce": nonce,
            "Verifier": verifier,
            "Url": session.crypto.encrypt(specifier.url.as_bytes(), &nonce)?,
        });

        let reply = match session.post(&body).await {
            Ok(reply) => reply,
            // The application went away between requests; let the facade
            // run its single reconnect.
            Err(LookupError::ConnectionRefused { .. }) => {
                return Err(LookupError::SessionExpired);
            }
            Err(e) => return Err(e),
        };

        if !reply.success {
            // The database was re-locked or the association was revoked
            // after it had been accepted.
            return Err(LookupError::SessionExpired);
        }

        let reply_nonce = reply
            .nonce
            .ok_or_else(|| LookupError::Protocol("reply carries no nonce".to_string()))?;

        let mut entries = Vec::with_capacity(reply.entries.len());
        for wire in reply.entries {
            let field = |ciphertext: &str| -> LookupResult<String> {
                let plain = session.crypto.decrypt(ciphertext, &reply_nonce)?;
                String::from_utf8(plain)
                    .map_err(|e| LookupError::Protocol(format!("entry field is not UTF-8: {e}")))
            };
            entries.push(CandidateEntry {
                title: field(&wire.name)?,
                username: field(&wire.login)?,
                password: field(&wire.password)?.into(),
                url: specifier.url.clone(),
                group: None,
            });
        }
        Ok(entries)
    }
}
