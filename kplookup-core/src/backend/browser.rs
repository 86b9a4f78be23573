//! Browser-integration protocol backend.
//!
//! The manager application exposes a Unix socket speaking JSON frames. A
//! session starts with a key exchange (`change-public-keys`), after which
//! every payload travels encrypted under the agreed channel key. The
//! persisted association (`test-associate` / `associate`) is what survives
//! across process runs; the channel key never does.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{LookupError, LookupResult};
use crate::specifier::Specifier;
use crate::store::Identity;

use super::crypto::{ChannelCrypto, RingChannelCrypto};
use super::transport::{SocketTransport, Transport, default_socket_path};
use super::{CandidateEntry, Connected, ManagerBackend, Session, wrong_session};

const CHANGE_PUBLIC_KEYS: &str = "change-public-keys";
const TEST_ASSOCIATE: &str = "test-associate";
const ASSOCIATE: &str = "associate";
const GET_LOGINS: &str = "get-logins";

/// Peer error code for "no logins found"; a query miss, not a failure
const ERROR_NO_LOGINS: i64 = 15;

/// Persisted association, serialized into the opaque identity blob
#[derive(Debug, Serialize, Deserialize)]
struct BrowserAssociation {
    client_id: String,
    id: String,
    id_key: String,
}

impl BrowserAssociation {
    fn from_identity(identity: &Identity) -> Option<Self> {
        serde_json::from_str(identity.expose_blob()).ok()
    }

    fn to_identity(&self) -> LookupResult<Identity> {
        let blob = serde_json::to_string(self)
            .map_err(|e| LookupError::Protocol(format!("failed to serialize identity: {e}")))?;
        Ok(Identity::from_blob(blob))
    }
}

/// Outcome of one encrypted request/response exchange
enum Reply {
    /// Decrypted inner payload
    Inner(Value),
    /// Peer signalled an error frame instead of a payload
    PeerError { code: Option<i64>, message: String },
}

/// One framed channel with its cipher state
struct Channel {
    transport: Box<dyn Transport>,
    crypto: Box<dyn ChannelCrypto>,
    client_id: String,
    /// Once true, I/O failures mean the peer dropped an established
    /// session rather than a broken handshake.
    established: bool,
}

impl Channel {
    /// Maps a transport failure: a peer-closed channel on an established
    /// session is `SessionExpired` (worth one reconnect); anything else,
    /// such as an oversized or garbled frame, is a malformed peer and
    /// must not be retried.
    fn io_error(&self, e: &std::io::Error) -> LookupError {
        let peer_closed = matches!(
            e.kind(),
            std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
        );
        if self.established && peer_closed {
            LookupError::SessionExpired
        } else if self.established {
            LookupError::Protocol(format!("transport failure on established session: {e}"))
        } else {
            LookupError::Protocol(format!("connection lost during handshake: {e}"))
        }
    }

    async fn raw_exchange(&mut self, payload: &Value) -> LookupResult<Value> {
        let frame = payload.to_string();
        if let Err(e) = self.transport.send(frame.as_bytes()).await {
            return Err(self.io_error(&e));
        }
        let reply = match self.transport.recv().await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.io_error(&e)),
        };
        serde_json::from_slice(&reply)
            .map_err(|e| LookupError::Protocol(format!("response is not valid JSON: {e}")))
    }

    /// Performs the plaintext key exchange that opens the channel
    async fn key_exchange(&mut self) -> LookupResult<()> {
        let nonce = self.crypto.nonce();
        let request = json!({
            "action": CHANGE_PUBLIC_KEYS,
            "publicKey": self.crypto.public_key(),
            "nonce": nonce,
            "clientID": self.client_id,
        });
        let reply = self.raw_exchange(&request).await?;

        if reply.get("success").and_then(Value::as_str) != Some("true") {
            return Err(LookupError::Protocol(
                "peer rejected the key exchange".to_string(),
            ));
        }
        let peer_key = reply
            .get("publicKey")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                LookupError::Protocol("key exchange reply carries no public key".to_string())
            })?;
        self.crypto.key_exchange(peer_key)?;
        debug!(client_id = %self.client_id, "channel key established");
        Ok(())
    }

    /// Sends `inner` encrypted and returns the decrypted reply payload
    async fn encrypted_exchange(&mut self, action: &str, inner: &Value) -> LookupResult<Reply> {
        let nonce = self.crypto.nonce();
        let message = self.crypto.encrypt(inner.to_string().as_bytes(), &nonce)?;
        let outer = json!({
            "action": action,
            "message": message,
            "nonce": nonce,
            "clientID": self.client_id,
        });
        let reply = self.raw_exchange(&outer).await?;

        if reply.get("error").is_some() || reply.get("errorCode").is_some() {
            let code = reply.get("errorCode").and_then(error_code);
            let message = reply
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unspecified peer error")
                .to_string();
            return Ok(Reply::PeerError { code, message });
        }

        let reply_nonce = reply
            .get("nonce")
            .and_then(Value::as_str)
            .ok_or_else(|| LookupError::Protocol("reply carries no nonce".to_string()))?;
        let reply_message = reply
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| LookupError::Protocol("reply carries no message".to_string()))?;
        let plain = self.crypto.decrypt(reply_message, reply_nonce)?;
        let inner = serde_json::from_slice(&plain)
            .map_err(|e| LookupError::Protocol(format!("reply payload is not valid JSON: {e}")))?;
        Ok(Reply::Inner(inner))
    }
}

/// The peer encodes error codes both as numbers and as strings
fn error_code(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// An established, associated browser-protocol session
pub struct BrowserSession {
    channel: Channel,
    assoc: BrowserAssociation,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("client_id", &self.channel.client_id)
            .field("assoc_id", &self.assoc.id)
            .finish_non_exhaustive()
    }
}

/// Runs the full session handshake over an open transport.
///
/// Split out from the backend so tests can drive it with a scripted
/// transport and a pass-through cipher.
async fn handshake(
    transport: Box<dyn Transport>,
    crypto: Box<dyn ChannelCrypto>,
    client_id: &str,
    identity: Option<Identity>,
) -> LookupResult<(BrowserSession, Identity, bool)> {
    let mut channel = Channel {
        transport,
        crypto,
        client_id: client_id.to_string(),
        established: false,
    };
    channel.key_exchange().await?;

    // A persisted association is only worth testing if it was formed under
    // the same client id.
    let prior = identity
        .as_ref()
        .and_then(BrowserAssociation::from_identity)
        .filter(|assoc| {
            if assoc.client_id == client_id {
                true
            } else {
                warn!(
                    stored = %assoc.client_id,
                    current = %client_id,
                    "persisted association was formed under a different client id; re-pairing"
                );
                false
            }
        });

    if let Some(assoc) = prior {
        let inner = json!({
            "action": TEST_ASSOCIATE,
            "id": assoc.id,
            "key": assoc.id_key,
        });
        match channel.encrypted_exchange(TEST_ASSOCIATE, &inner).await? {
            Reply::Inner(reply) if success(&reply) => {
                debug!(id = %assoc.id, "existing association accepted");
                channel.established = true;
                let identity = assoc.to_identity()?;
                return Ok((BrowserSession { channel, assoc }, identity, false));
            }
            Reply::Inner(_) | Reply::PeerError { .. } => {
                debug!("existing association rejected; pairing afresh");
            }
        }
    }

    let assoc = associate(&mut channel).await?;
    let identity = assoc.to_identity()?;
    channel.established = true;
    Ok((BrowserSession { channel, assoc }, identity, true))
}

/// Pairing handshake; blocks until the user answers the manager
/// application's association prompt (the caller bounds the wait).
async fn associate(channel: &mut Channel) -> LookupResult<BrowserAssociation> {
    let id_key = channel.crypto.random_key();
    let inner = json!({
        "action": ASSOCIATE,
        "key": channel.crypto.public_key(),
        "idKey": id_key,
    });
    let reply = match channel.encrypted_exchange(ASSOCIATE, &inner).await? {
        Reply::Inner(reply) => reply,
        Reply::PeerError { code, message } => {
            debug!(?code, %message, "associate rejected by peer");
            return Err(LookupError::PairingDenied);
        }
    };
    if !success(&reply) {
        return Err(LookupError::PairingDenied);
    }
    let id = reply
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| LookupError::Protocol("associate reply carries no id".to_string()))?
        .to_string();
    debug!(%id, "pairing completed");
    Ok(BrowserAssociation {
        client_id: channel.client_id.clone(),
        id,
        id_key,
    })
}

fn success(reply: &Value) -> bool {
    reply.get("success").and_then(Value::as_str) == Some("true")
}

/// Entry as it appears in a `get-logins` reply
#[derive(Debug, Deserialize)]
struct WireEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    login: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    group: Option<String>,
}

/// Issues one `get-logins` query over an established session
async fn get_logins(
    session: &mut BrowserSession,
    specifier: &Specifier,
) -> LookupResult<Vec<CandidateEntry>> {
    let inner = json!({
        "action": GET_LOGINS,
        "url": specifier.url,
        "keys": [{"id": session.assoc.id, "key": session.assoc.id_key}],
    });
    let reply = match session.channel.encrypted_exchange(GET_LOGINS, &inner).await? {
        Reply::Inner(reply) => reply,
        Reply::PeerError {
            code: Some(ERROR_NO_LOGINS),
            ..
        } => return Ok(Vec::new()),
        Reply::PeerError { code, message } => {
            return Err(LookupError::Protocol(format!(
                "get-logins failed (code {code:?}): {message}"
            )));
        }
    };

    let entries: Vec<WireEntry> = reply
        .get("entries")
        .cloned()
        .map_or_else(|| Ok(Vec::new()), serde_json::from_value)
        .map_err(|e| LookupError::Protocol(format!("malformed entry list: {e}")))?;

    Ok(entries
        .into_iter()
        .map(|e| CandidateEntry {
            title: e.name,
            username: e.login,
            password: e.password.into(),
            url: specifier.url.clone(),
            group: e.group,
        })
        .collect())
}

/// Adapter for the browser-integration protocol
pub struct BrowserProtocolBackend {
    socket_path: PathBuf,
    client_id: String,
}

impl BrowserProtocolBackend {
    /// Creates a backend for the given socket, falling back to the
    /// manager application's default socket location.
    #[must_use]
    pub fn new(socket_path: Option<PathBuf>, client_id: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.unwrap_or_else(default_socket_path),
            client_id: client_id.into(),
        }
    }

    /// Returns the socket path this backend connects to
    #[must_use]
    pub fn socket_path(&self) -> &std::path::Path {
        &self.socket_path
    }
}

#[async_trait]
impl ManagerBackend for BrowserProtocolBackend {
    fn backend_id(&self) -> &'static str {
        "browser"
    }

    async fn connect(&self, identity: Option<Identity>) -> LookupResult<Connected> {
        let transport = SocketTransport::connect(&self.socket_path).await?;
        let crypto = RingChannelCrypto::new()?;
        let (session, identity, freshly_paired) = handshake(
            Box::new(transport),
            Box::new(crypto),
            &self.client_id,
            identity,
        )
        .await?;
        Ok(Connected {
            session: Session::Browser(session),
            identity,
            freshly_paired,
        })
    }

    async fn query(
        &self,
        session: &mut Session,
        specifier: &Specifier,
    ) -> LookupResult<Vec<CandidateEntry>> {
        match session {
            Session::Browser(session) => get_logins(session, specifier).await,
            Session::Http(_) => Err(wrong_session(self.backend_id())),
        }
    }
}
