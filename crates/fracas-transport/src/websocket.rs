//! WebSocket transport built on `tokio-tungstenite`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{ConnectionId, FrameSink, FrameSource, Transport, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// Listens for WebSocket clients.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a listener to `addr` (use port 0 for an ephemeral port).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| TransportError::AcceptFailed(io::Error::new(io::ErrorKind::ConnectionRefused, e)))?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        Ok(WebSocketConnection { id, addr, ws })
    }
}

/// An accepted WebSocket, not yet split.
pub struct WebSocketConnection {
    id: ConnectionId,
    addr: SocketAddr,
    ws: WsStream,
}

impl WebSocketConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Splits into independently owned send and receive halves.
    pub fn split(self) -> (WebSocketSink, WebSocketSource) {
        let (sink, stream) = self.ws.split();
        (
            WebSocketSink { id: self.id, sink },
            WebSocketSource {
                id: self.id,
                stream,
            },
        )
    }
}

/// Sending half of a WebSocket connection.
pub struct WebSocketSink {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
}

impl WebSocketSink {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl FrameSink for WebSocketSink {
    type Error = TransportError;

    async fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.sink
            .send(Message::Binary(frame.to_vec().into()))
            .await
            .map_err(|e| TransportError::SendFailed(io::Error::new(io::ErrorKind::BrokenPipe, e)))
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(io::Error::new(io::ErrorKind::BrokenPipe, e)))
    }
}

/// Receiving half of a WebSocket connection.
pub struct WebSocketSource {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

impl WebSocketSource {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl FrameSource for WebSocketSource {
    type Error = TransportError;

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, Self::Error> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }
}
