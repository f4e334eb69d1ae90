//! Frame transport for the Fracas server.
//!
//! The game core never sees sockets. It sees whole frames arriving from a
//! [`FrameSource`] and hands whole frames to a [`FrameSink`]. A connection is
//! split into those two halves as soon as it is accepted so that the reader
//! task can block on the network while the writer task keeps delivering
//! broadcasts.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketSink, WebSocketSource, WebSocketTransport};

use std::fmt;

/// Opaque identifier for an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts incoming connections.
pub trait Transport: Send + 'static {
    /// The connection type produced by this transport.
    type Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// The sending half of a connection.
pub trait FrameSink: Send + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes one frame.
    async fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Sends a close frame. Further sends fail.
    async fn close(&mut self) -> Result<(), Self::Error>;
}

/// The receiving half of a connection.
pub trait FrameSource: Send + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Reads the next frame. `Ok(None)` means the peer closed cleanly.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, Self::Error>;
}
