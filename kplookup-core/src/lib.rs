//! `kplookup` Core Library
//!
//! Resolves symbolic credential references (a URL plus optional
//! disambiguating attributes) into secret values by querying a locally
//! running password manager, so automation tooling can inject service
//! passwords without storing them in plaintext.
//!
//! # Crate Structure
//!
//! - [`specifier`] - Free-text query parsing (`url=... login=...`)
//! - [`store`] - Persisted client identity with atomic replacement
//! - [`backend`] - Protocol adapters (browser socket, legacy HTTP)
//! - [`selector`] - Deterministic entry selection policy
//! - [`lookup`] - The resolve facade with process-wide session caching
//! - [`config`] - TOML settings (backend, paths, timeouts)
//! - [`trace`] - Tracing bootstrap for embedding binaries

// Enable missing_docs warning for public API documentation
#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;
pub mod lookup;
pub mod selector;
pub mod specifier;
pub mod store;
pub mod trace;

pub use backend::{
    BrowserProtocolBackend, CandidateEntry, ChannelCrypto, Connected, HTTPProtocolBackend,
    ManagerBackend, PlainCrypto, RingChannelCrypto, Session, SocketTransport, Transport,
};
pub use config::{BackendKind, LookupSettings};
pub use error::{ConfigError, ConfigResult, LookupError, LookupResult};
pub use lookup::CredentialLookup;
pub use selector::select;
pub use specifier::Specifier;
pub use store::{Identity, IdentityStore};
