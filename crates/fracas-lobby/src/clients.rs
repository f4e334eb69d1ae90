//! Connected clients.

use std::collections::BTreeMap;

use fracas_protocol::{ClientId, GameId, ServerMessage};

use crate::PeerSender;

/// What the server knows about one connection.
#[derive(Debug)]
pub struct ClientRecord {
    pub id: ClientId,
    pub sender: PeerSender,
    /// The lobby this client is in. A lookup key into
    /// [`crate::ServerData`], never an owning reference.
    pub game_id: Option<GameId>,
}

/// All connected clients, keyed by id.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: BTreeMap<ClientId, ClientRecord>,
    next_id: u32,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and assigns it a fresh id.
    pub fn insert(&mut self, sender: PeerSender) -> ClientId {
        self.next_id += 1;
        let id = ClientId(self.next_id);
        self.clients.insert(
            id,
            ClientRecord {
                id,
                sender,
                game_id: None,
            },
        );
        id
    }

    pub fn remove(&mut self, id: ClientId) -> Option<ClientRecord> {
        self.clients.remove(&id)
    }

    pub fn get(&self, id: ClientId) -> Option<&ClientRecord> {
        self.clients.get(&id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut ClientRecord> {
        self.clients.get_mut(&id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn game_of(&self, id: ClientId) -> Option<GameId> {
        self.clients.get(&id).and_then(|c| c.game_id)
    }

    pub fn set_game(&mut self, id: ClientId, game_id: Option<GameId>) {
        if let Some(record) = self.clients.get_mut(&id) {
            record.game_id = game_id;
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Sends to one client. Returns `false` if the client is gone or its
    /// channel is closed.
    pub fn send(&self, id: ClientId, msg: ServerMessage) -> bool {
        match self.clients.get(&id) {
            Some(record) => record.sender.send(msg).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let mut clients = ClientRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = clients.insert(tx.clone());
        let b = clients.insert(tx);
        assert!(b > a);
        assert_eq!(clients.len(), 2);
    }

    #[test]
    fn test_send_to_missing_client_returns_false() {
        let clients = ClientRegistry::new();
        assert!(!clients.send(ClientId(9), ServerMessage::LeaveGameResponse));
    }

    #[test]
    fn test_send_after_receiver_dropped_returns_false() {
        let mut clients = ClientRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = clients.insert(tx);
        drop(rx);
        assert!(!clients.send(id, ServerMessage::LeaveGameResponse));
    }

    #[test]
    fn test_set_game_tracks_lobby() {
        let mut clients = ClientRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = clients.insert(tx);
        assert_eq!(clients.game_of(id), None);
        clients.set_game(id, Some(GameId(3)));
        assert_eq!(clients.game_of(id), Some(GameId(3)));
    }
}
