//! Framed transport to the browser-protocol socket.
//!
//! Messages are JSON documents framed with a 4-byte little-endian length
//! prefix. The transport is a seam: the handshake state machine in
//! [`super::browser`] is written against [`Transport`], so tests can drive
//! it with a scripted in-memory peer.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::error::{LookupError, LookupResult};

/// Upper bound on a single frame; anything larger is a malformed peer
const MAX_FRAME_LEN: u32 = 1024 * 1024;

/// Socket file name published by the manager application
const SOCKET_NAME: &str = "org.keepassxc.KeePassXC.BrowserServer";

/// Bidirectional frame transport
#[async_trait]
pub trait Transport: Send {
    /// Sends one frame
    async fn send(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Receives one frame; `UnexpectedEof` means the peer closed the channel
    async fn recv(&mut self) -> io::Result<Vec<u8>>;
}

/// Returns the default socket path for the browser protocol.
///
/// `$XDG_RUNTIME_DIR` is where the manager application binds its socket;
/// `/tmp` is the documented fallback for sessions without a runtime dir.
#[must_use]
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(SOCKET_NAME)
}

/// Length-prefixed transport over a local Unix socket
pub struct SocketTransport {
    stream: UnixStream,
}

impl SocketTransport {
    /// Connects to the manager application's socket.
    ///
    /// # Errors
    /// Returns [`LookupError::ConnectionRefused`] when nothing is listening
    /// at `path`.
    pub async fn connect(path: &Path) -> LookupResult<Self> {
        match UnixStream::connect(path).await {
            Ok(stream) => Ok(Self { stream }),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                ) =>
            {
                Err(LookupError::ConnectionRefused {
                    endpoint: path.display().to_string(),
                })
            }
            Err(e) => Err(LookupError::Protocol(format!(
                "failed to open socket {}: {e}",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl Transport for SocketTransport {
    async fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        let len = u32::try_from(frame.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;
        self.stream.write_all(&len.to_le_bytes()).await?;
        self.stream.write_all(frame).await?;
        self.stream.flush().await
    }

    async fn recv(&mut self) -> io::Result<Vec<u8>> {
        let mut len_bytes = [0u8; 4];
        self.stream.read_exact(&mut len_bytes).await?;
        let len = u32::from_le_bytes(len_bytes);
        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds limit"),
            ));
        }
        let mut frame = vec![0u8; len as usize];
        self.stream.read_exact(&mut frame).await?;
        Ok(frame)
    }
}
