//! Per-connection handler: registration, then one reader and one writer.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Ask the game loop for a client id (refused when the server is full)
//!   2. Spawn the writer: drain the client's outbox into frames
//!   3. Loop: receive frames → decode `Envelope<ClientRpc>` → forward
//!   4. On close or error, tell the game loop the client is gone

use std::time::Instant;

use fracas_protocol::{ClientId, ClientRpc, Codec, Envelope, ServerMessage};
use fracas_transport::{FrameSink, FrameSource, WebSocketConnection, WebSocketSink, WebSocketSource};
use tokio::sync::{mpsc, oneshot};

use crate::FracasError;
use crate::server::Inbound;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C>(
    conn: WebSocketConnection,
    inbound: mpsc::UnboundedSender<Inbound>,
    codec: C,
) -> Result<(), FracasError>
where
    C: Codec + Clone,
{
    let conn_id = conn.id();
    let peer = conn.peer_addr();
    let (mut sink, mut source) = conn.split();

    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = oneshot::channel();
    inbound
        .send(Inbound::Connect {
            sender: outbox_tx,
            reply: reply_tx,
        })
        .map_err(|_| FracasError::GameLoopStopped)?;

    let client_id = match reply_rx.await {
        Ok(Ok(id)) => id,
        Ok(Err(e)) => {
            let refusal = Envelope::new(0, 0, e.to_message());
            sink.send(&codec.encode(&refusal)?).await?;
            sink.close().await?;
            return Err(e.into());
        }
        Err(_) => return Err(FracasError::GameLoopStopped),
    };

    tracing::debug!(%conn_id, %peer, %client_id, "connection registered");

    tokio::spawn(write_loop(sink, outbox_rx, codec.clone(), client_id));

    let result = read_loop(&mut source, &inbound, &codec, client_id).await;

    // The game loop drops the outbox sender on removal, which ends the writer.
    let _ = inbound.send(Inbound::Disconnect { client: client_id });
    result
}

/// Forwards decoded RPCs until the peer closes.
async fn read_loop<C: Codec>(
    source: &mut WebSocketSource,
    inbound: &mpsc::UnboundedSender<Inbound>,
    codec: &C,
    client_id: ClientId,
) -> Result<(), FracasError> {
    loop {
        let data = match source.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%client_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope<ClientRpc> = match codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%client_id, error = %e, "failed to decode envelope");
                continue;
            }
        };

        let rpc = Inbound::Rpc {
            client: client_id,
            rpc: envelope.body,
        };
        if inbound.send(rpc).is_err() {
            return Err(FracasError::GameLoopStopped);
        }
    }
}

/// Wraps every outgoing message in an envelope and writes it.
async fn write_loop<C: Codec>(
    mut sink: WebSocketSink,
    mut outbox: mpsc::UnboundedReceiver<ServerMessage>,
    codec: C,
    client_id: ClientId,
) {
    let start = Instant::now();
    let mut seq: u64 = 0;

    while let Some(msg) = outbox.recv().await {
        let envelope = Envelope::new(next_seq(&mut seq), elapsed_ms(&start), msg);
        let frame = match codec.encode(&envelope) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%client_id, error = %e, "failed to encode message");
                continue;
            }
        };
        if let Err(e) = sink.send(&frame).await {
            tracing::debug!(%client_id, error = %e, "send failed, stopping writer");
            break;
        }
    }

    let _ = sink.close().await;
}

fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

fn elapsed_ms(start: &Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
