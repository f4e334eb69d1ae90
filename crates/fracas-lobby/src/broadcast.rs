//! Fan-out to a lobby's roster.

use fracas_protocol::{ClientId, ServerMessage};
use tokio::sync::mpsc;

use crate::{ClientRegistry, Player};

/// Channel that delivers outbound messages to one client's writer task.
pub type PeerSender = mpsc::UnboundedSender<ServerMessage>;

/// Sends lobby messages through the client registry.
///
/// A player whose client record is missing (disconnected, not yet removed
/// from the roster) is skipped silently.
#[derive(Clone, Copy)]
pub struct Broadcaster<'a> {
    clients: &'a ClientRegistry,
}

impl<'a> Broadcaster<'a> {
    pub fn new(clients: &'a ClientRegistry) -> Self {
        Self { clients }
    }

    pub fn send_to(&self, id: ClientId, msg: ServerMessage) {
        if !self.clients.send(id, msg) {
            tracing::trace!(client_id = %id, "recipient gone, message dropped");
        }
    }

    /// Sends the same message to every player.
    pub fn broadcast(&self, players: &[Player], msg: &ServerMessage) {
        for player in players {
            self.send_to(player.id, msg.clone());
        }
    }

    /// Sends a per-recipient message to every player.
    pub fn broadcast_with(&self, players: &[Player], build: impl Fn(ClientId) -> ServerMessage) {
        for player in players {
            self.send_to(player.id, build(player.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use fracas_protocol::Family;

    use super::*;

    fn player(id: ClientId) -> Player {
        Player {
            id,
            name: "p".into(),
            family: Family::Zero,
            ready: false,
        }
    }

    #[test]
    fn test_broadcast_skips_missing_clients() {
        let mut clients = ClientRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let present = clients.insert(tx);

        let players = vec![player(present), player(ClientId(99))];
        Broadcaster::new(&clients).broadcast(&players, &ServerMessage::StartGameResponse);

        assert_eq!(rx.try_recv().unwrap(), ServerMessage::StartGameResponse);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_with_builds_per_recipient() {
        let mut clients = ClientRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = clients.insert(tx_a);
        let b = clients.insert(tx_b);

        let players = vec![player(a), player(b)];
        Broadcaster::new(&clients).broadcast_with(&players, |id| ServerMessage::PlayerLeft {
            user_id: id,
        });

        assert_eq!(rx_a.try_recv().unwrap(), ServerMessage::PlayerLeft { user_id: a });
        assert_eq!(rx_b.try_recv().unwrap(), ServerMessage::PlayerLeft { user_id: b });
    }
}
