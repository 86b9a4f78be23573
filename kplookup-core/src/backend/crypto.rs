//! Channel cryptography as an injected capability.
//!
//! The subsystem does not define its own transport encryption; the secure
//! channel is a capability the backend adapter is constructed with. The
//! default implementation uses X25519 key agreement plus AES-256-GCM.
//! [`PlainCrypto`] exists so protocol tests can read the frames they
//! script.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use ring::aead::{Aad, AES_256_GCM, LessSafeKey, Nonce, NONCE_LEN, UnboundKey};
use ring::agreement::{EphemeralPrivateKey, UnparsedPublicKey, X25519, agree_ephemeral};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{LookupError, LookupResult};

/// Symmetric cipher for one channel, keyed either by key agreement
/// (browser protocol) or by a persisted raw key (HTTP protocol)
pub trait ChannelCrypto: Send + Sync {
    /// Client public key, base64, announced during key exchange
    fn public_key(&self) -> &str;

    /// Derives the channel key from the peer's announced public key
    ///
    /// # Errors
    /// `Protocol` if the peer key is not valid base64 or agreement fails.
    fn key_exchange(&mut self, peer_public_key_b64: &str) -> LookupResult<()>;

    /// Installs a raw symmetric key (base64), bypassing key agreement
    ///
    /// # Errors
    /// `Protocol` if the key is not a valid base64 key of the right size.
    fn adopt_key(&mut self, key_b64: &str) -> LookupResult<()>;

    /// Generates a fresh random key, base64, suitable for `adopt_key`
    fn random_key(&self) -> String;

    /// Generates a fresh random nonce, base64
    fn nonce(&self) -> String;

    /// Encrypts `plaintext` under the channel key; returns base64
    ///
    /// # Errors
    /// `Protocol` if no key is established or the nonce is malformed.
    fn encrypt(&self, plaintext: &[u8], nonce_b64: &str) -> LookupResult<String>;

    /// Decrypts a base64 message under the channel key
    ///
    /// # Errors
    /// `Protocol` if no key is established, the nonce is malformed, or
    /// authentication fails.
    fn decrypt(&self, ciphertext_b64: &str, nonce_b64: &str) -> LookupResult<Vec<u8>>;
}

/// Default channel crypto: X25519 agreement + AES-256-GCM
///
/// One instance serves one channel; the ephemeral private key is consumed
/// by the first `key_exchange`.
pub struct RingChannelCrypto {
    rng: SystemRandom,
    private_key: Option<EphemeralPrivateKey>,
    public_key_b64: String,
    key: Option<LessSafeKey>,
}

impl RingChannelCrypto {
    /// Generates a fresh ephemeral key pair.
    ///
    /// # Errors
    /// `Protocol` if the system RNG fails.
    pub fn new() -> LookupResult<Self> {
        let rng = SystemRandom::new();
        let private_key = EphemeralPrivateKey::generate(&X25519, &rng)
            .map_err(|_| LookupError::Protocol("failed to generate channel key pair".into()))?;
        let public_key = private_key
            .compute_public_key()
            .map_err(|_| LookupError::Protocol("failed to compute channel public key".into()))?;
        Ok(Self {
            rng,
            public_key_b64: B64.encode(public_key.as_ref()),
            private_key: Some(private_key),
            key: None,
        })
    }

    fn install_key(&mut self, key_bytes: &[u8]) -> LookupResult<()> {
        let unbound = UnboundKey::new(&AES_256_GCM, key_bytes)
            .map_err(|_| LookupError::Protocol("invalid channel key length".into()))?;
        self.key = Some(LessSafeKey::new(unbound));
        Ok(())
    }

    fn key(&self) -> LookupResult<&LessSafeKey> {
        self.key
            .as_ref()
            .ok_or_else(|| LookupError::Protocol("channel key not established".into()))
    }
}

impl ChannelCrypto for RingChannelCrypto {
    fn public_key(&self) -> &str {
        &self.public_key_b64
    }

    fn key_exchange(&mut self, peer_public_key_b64: &str) -> LookupResult<()> {
        let peer_bytes = B64
            .decode(peer_public_key_b64)
            .map_err(|e| LookupError::Protocol(format!("peer public key is not base64: {e}")))?;
        let private_key = self
            .private_key
            .take()
            .ok_or_else(|| LookupError::Protocol("key exchange already performed".into()))?;

        let shared: [u8; 32] = agree_ephemeral(
            private_key,
            &UnparsedPublicKey::new(&X25519, peer_bytes),
            |secret| {
                let mut key = [0u8; 32];
                key.copy_from_slice(secret);
                key
            },
        )
        .map_err(|_| LookupError::Protocol("key agreement with peer failed".into()))?;

        self.install_key(&shared)
    }

    fn adopt_key(&mut self, key_b64: &str) -> LookupResult<()> {
        let key_bytes = B64
            .decode(key_b64)
            .map_err(|e| LookupError::Protocol(format!("stored key is not base64: {e}")))?;
        self.install_key(&key_bytes)
    }

    fn random_key(&self) -> String {
        let mut key = [0u8; 32];
        // SystemRandom::fill only fails on catastrophic RNG breakage.
        if self.rng.fill(&mut key).is_err() {
            return String::new();
        }
        B64.encode(key)
    }

    fn nonce(&self) -> String {
        let mut nonce = [0u8; NONCE_LEN];
        if self.rng.fill(&mut nonce).is_err() {
            return String::new();
        }
        B64.encode(nonce)
    }

    fn encrypt(&self, plaintext: &[u8], nonce_b64: &str) -> LookupResult<String> {
        let key = self.key()?;
        let nonce = decode_nonce(nonce_b64)?;
        let mut buf = plaintext.to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut buf)
            .map_err(|_| LookupError::Protocol("encryption failed".into()))?;
        Ok(B64.encode(buf))
    }

    fn decrypt(&self, ciphertext_b64: &str, nonce_b64: &str) -> LookupResult<Vec<u8>> {
        let key = self.key()?;
        let nonce = decode_nonce(nonce_b64)?;
        let mut buf = B64
            .decode(ciphertext_b64)
            .map_err(|e| LookupError::Protocol(format!("message is not base64: {e}")))?;
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut buf)
            .map_err(|_| LookupError::Protocol("message authentication failed".into()))?;
        Ok(plaintext.to_vec())
    }
}

/// Decodes a base64 wire nonce into an AEAD nonce
fn decode_nonce(nonce_b64: &str) -> LookupResult<Nonce> {
    let bytes = B64
        .decode(nonce_b64)
        .map_err(|e| LookupError::Protocol(format!("nonce is not base64: {e}")))?;
    let array: [u8; NONCE_LEN] = bytes
        .try_into()
        .map_err(|_| LookupError::Protocol("nonce has wrong length".into()))?;
    Ok(Nonce::assume_unique_for_key(array))
}

/// Pass-through cipher for protocol tests: "ciphertext" is base64 of the
/// plaintext and nonces are a counter, so scripted peers can read frames.
#[derive(Default)]
pub struct PlainCrypto {
    counter: std::sync::atomic::AtomicU64,
}

impl PlainCrypto {
    /// Creates a pass-through cipher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChannelCrypto for PlainCrypto {
    fn public_key(&self) -> &str {
        "cGxhaW4tcHVibGljLWtleQ=="
    }

    fn key_exchange(&mut self, _peer_public_key_b64: &str) -> LookupResult<()> {
        Ok(())
    }

    fn adopt_key(&mut self, _key_b64: &str) -> LookupResult<()> {
        Ok(())
    }

    fn random_key(&self) -> String {
        B64.encode([7u8; 32])
    }

    fn nonce(&self) -> String {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        B64.encode(n.to_le_bytes())
    }

    fn encrypt(&self, plaintext: &[u8], _nonce_b64: &str) -> LookupResult<String> {
        Ok(B64.encode(plaintext))
    }

    fn decrypt(&self, ciphertext_b64: &str, _nonce_b64: &str) -> LookupResult<Vec<u8>> {
        B64.decode(ciphertext_b64)
            .map_err(|e| LookupError::Protocol(format!("message is not base64: {e}")))
    }
}
