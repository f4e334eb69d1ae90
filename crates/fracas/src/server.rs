//! `FracasServer` builder, accept loop, and game loop.
//!
//! The game loop is the only task that touches [`ServerData`]. Connection
//! handlers talk to it through an unbounded [`Inbound`] channel, and it
//! talks back through each client's [`PeerSender`].

use fracas_lobby::{LobbyConfig, LobbyError, PeerSender, QuestionBank, ServerData, ServerLimits};
use fracas_protocol::{ClientId, ClientRpc, JsonCodec};
use fracas_tick::{TickConfig, TickScheduler};
use fracas_transport::{Transport, WebSocketTransport};
use tokio::sync::{mpsc, oneshot};

use crate::FracasError;
use crate::handler::handle_connection;

/// Everything a connection handler can ask of the game loop.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// A socket was accepted. The game loop assigns a client id or refuses.
    Connect {
        sender: PeerSender,
        reply: oneshot::Sender<Result<ClientId, LobbyError>>,
    },
    Rpc {
        client: ClientId,
        rpc: ClientRpc,
    },
    Disconnect {
        client: ClientId,
    },
}

/// Builder for configuring and starting a Fracas server.
///
/// # Example
///
/// ```rust,ignore
/// use fracas::prelude::*;
///
/// let server = FracasServer::builder()
///     .bind("0.0.0.0:8080")
///     .lobby_config(LobbyConfig { rounds: 5, ..LobbyConfig::default() })
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct FracasServerBuilder {
    bind_addr: String,
    lobby_config: LobbyConfig,
    limits: ServerLimits,
    tick_config: TickConfig,
    questions: Option<QuestionBank>,
}

impl FracasServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            lobby_config: LobbyConfig::default(),
            limits: ServerLimits::default(),
            tick_config: TickConfig::default(),
            questions: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets round count and stage timeouts for every lobby.
    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.lobby_config = config;
        self
    }

    /// Sets server-wide capacity limits.
    pub fn limits(mut self, limits: ServerLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn tick_config(mut self, config: TickConfig) -> Self {
        self.tick_config = config;
        self
    }

    /// Replaces the built-in question bank.
    pub fn questions(mut self, bank: QuestionBank) -> Self {
        self.questions = Some(bank);
        self
    }

    /// Binds the listener and prepares the game state.
    ///
    /// Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build(self) -> Result<FracasServer, FracasError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let questions = self.questions.unwrap_or_else(QuestionBank::builtin);

        tracing::info!(
            addr = %self.bind_addr,
            questions = questions.len(),
            rounds = self.lobby_config.rounds,
            "server configured"
        );

        let data = ServerData::new(self.lobby_config, self.limits, questions);

        Ok(FracasServer {
            transport,
            data,
            tick_config: self.tick_config,
        })
    }
}

impl Default for FracasServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Fracas server.
///
/// Call [`run()`](Self::run) to start the game loop and accept connections.
pub struct FracasServer {
    transport: WebSocketTransport,
    data: ServerData,
    tick_config: TickConfig,
}

impl FracasServer {
    /// Creates a new builder.
    pub fn builder() -> FracasServerBuilder {
        FracasServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Spawns the game loop, then accepts connections until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), FracasError> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let scheduler = TickScheduler::new(self.tick_config);
        tokio::spawn(game_loop(self.data, inbound_rx, scheduler));

        tracing::info!("Fracas server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let inbound = inbound_tx.clone();
                    tokio::spawn(async move {
                        let conn_id = conn.id();
                        if let Err(e) = handle_connection(conn, inbound, JsonCodec).await {
                            tracing::debug!(%conn_id, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Owns `ServerData` for the life of the server.
///
/// Returns once every `Inbound` sender is gone.
async fn game_loop(
    mut data: ServerData,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    mut scheduler: TickScheduler,
) {
    loop {
        tokio::select! {
            msg = inbound.recv() => {
                let Some(msg) = msg else { break };
                handle_inbound(&mut data, msg);
            }
            info = scheduler.wait_for_tick() => {
                data.tick(info.dt);
                scheduler.record_tick_end();
            }
        }
    }

    tracing::info!(ticks = scheduler.tick_count(), "game loop stopped");
}

fn handle_inbound(data: &mut ServerData, msg: Inbound) {
    match msg {
        Inbound::Connect { sender, reply } => {
            let result = data.add_client(sender);
            if let Err(Ok(id)) = reply.send(result) {
                // handler went away before it learned its id
                data.remove_client(id);
            }
        }
        Inbound::Rpc { client, rpc } => data.handle_rpc(client, rpc),
        Inbound::Disconnect { client } => data.remove_client(client),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> ServerData {
        ServerData::new(LobbyConfig::default(), ServerLimits::default(), QuestionBank::builtin())
            .with_seed(3)
    }

    #[test]
    fn test_builder_defaults() {
        let builder = FracasServerBuilder::default();
        assert_eq!(builder.bind_addr, "127.0.0.1:8080");
        assert_eq!(builder.lobby_config, LobbyConfig::default());
        assert!(builder.questions.is_none());
    }

    #[test]
    fn test_handle_inbound_connect_replies_with_id() {
        let mut data = data();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (reply_tx, mut reply_rx) = oneshot::channel();

        handle_inbound(&mut data, Inbound::Connect { sender: tx, reply: reply_tx });

        let id = reply_rx.try_recv().unwrap().unwrap();
        assert!(data.clients().contains(id));
    }

    #[test]
    fn test_handle_inbound_connect_with_dropped_reply_removes_client() {
        let mut data = data();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        drop(reply_rx);

        handle_inbound(&mut data, Inbound::Connect { sender: tx, reply: reply_tx });

        assert_eq!(data.client_count(), 0);
    }

    #[test]
    fn test_handle_inbound_disconnect_removes_client() {
        let mut data = data();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = data.add_client(tx).unwrap();

        handle_inbound(&mut data, Inbound::Disconnect { client: id });

        assert_eq!(data.client_count(), 0);
    }
}
