//! The process-wide registry of lobbies and clients.
//!
//! `ServerData` is the single owner of every [`Lobby`] and [`ClientRecord`].
//! It is driven from one task, so nothing in it needs a lock: client RPCs
//! arrive through [`handle_rpc`](ServerData::handle_rpc) and time arrives
//! through [`tick`](ServerData::tick).
//!
//! [`ClientRecord`]: crate::ClientRecord

use std::collections::BTreeMap;
use std::time::Duration;

use fracas_protocol::{ClientId, ClientRpc, GameId, GameMetadata, ServerMessage};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::{
    ActionRejected, Broadcaster, ClientRegistry, Lobby, LobbyConfig, LobbyError, LobbyProperties,
    LobbyStage, PeerSender, QuestionBank, ServerLimits,
};

pub struct ServerData {
    lobbies: BTreeMap<GameId, Lobby>,
    clients: ClientRegistry,
    config: LobbyConfig,
    limits: ServerLimits,
    questions: QuestionBank,
    rng: StdRng,
    next_game_id: u32,
}

impl ServerData {
    pub fn new(config: LobbyConfig, limits: ServerLimits, questions: QuestionBank) -> Self {
        Self {
            lobbies: BTreeMap::new(),
            clients: ClientRegistry::new(),
            config: config.validated(),
            limits,
            questions,
            rng: StdRng::from_os_rng(),
            next_game_id: 0,
        }
    }

    /// Replaces the question-dealing RNG with a seeded one.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    // -- Accessors --

    pub fn lobby(&self, id: GameId) -> Option<&Lobby> {
        self.lobbies.get(&id)
    }

    pub fn lobbies(&self) -> impl Iterator<Item = &Lobby> {
        self.lobbies.values()
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn limits(&self) -> &ServerLimits {
        &self.limits
    }

    // -----------------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------------

    /// Registers a new connection.
    pub fn add_client(&mut self, sender: PeerSender) -> Result<ClientId, LobbyError> {
        if self.clients.len() >= self.limits.max_clients {
            return Err(LobbyError::ServerFull(self.limits.max_clients));
        }
        let id = self.clients.insert(sender);
        tracing::info!(client_id = %id, clients = self.clients.len(), "client connected");
        Ok(id)
    }

    /// Drops a connection, leaving its lobby first.
    pub fn remove_client(&mut self, id: ClientId) {
        if self.clients.game_of(id).is_some() {
            if let Err(e) = self.leave_game(id) {
                tracing::debug!(client_id = %id, error = %e, "leave on disconnect failed");
            }
        }
        if self.clients.remove(id).is_some() {
            tracing::info!(client_id = %id, clients = self.clients.len(), "client disconnected");
        }
    }

    // -----------------------------------------------------------------------
    // RPC routing
    // -----------------------------------------------------------------------

    /// Handles one client RPC.
    ///
    /// Lobby-management requests always get a response or an `Error`. In-game
    /// actions are routed to the client's lobby; rejected actions are logged
    /// and dropped.
    pub fn handle_rpc(&mut self, client: ClientId, rpc: ClientRpc) {
        if !self.clients.contains(client) {
            tracing::debug!(client_id = %client, rpc = rpc.name(), "rpc from unknown client, dropped");
            return;
        }
        let name = rpc.name();
        tracing::trace!(client_id = %client, rpc = name, "rpc received");

        match rpc {
            ClientRpc::ListGames => {
                let games = self.list_games();
                self.respond(client, name, Ok(ServerMessage::ListGamesResponse { games }));
            }
            ClientRpc::GetGame { game_id } => {
                let result = self.get_game(game_id);
                self.respond(client, name, result);
            }
            ClientRpc::CreateGame {
                name: game_name,
                owner_name,
                is_self_hosted,
            } => {
                let result = self
                    .create_game(client, &game_name, &owner_name, is_self_hosted)
                    .map(|game_id| ServerMessage::CreateGameResponse {
                        game_id,
                        owner_id: client,
                    });
                self.respond(client, name, result);
            }
            ClientRpc::JoinGame {
                game_id,
                player_name,
            } => {
                let result = self
                    .join_game(client, game_id, &player_name)
                    .map(|game| ServerMessage::JoinGameResponse { game });
                self.respond(client, name, result);
            }
            ClientRpc::SwapTeam { game_id, user_id } => {
                // Success is announced to the whole lobby by `swap_team`.
                if let Err(e) = self.swap_team(client, game_id, user_id) {
                    self.respond(client, name, Err(e));
                }
            }
            ClientRpc::LeaveGame => {
                let result = self
                    .leave_game(client)
                    .map(|()| ServerMessage::LeaveGameResponse);
                self.respond(client, name, result);
            }
            ClientRpc::StartGame { game_id } => {
                let result = self
                    .start_game(client, game_id)
                    .map(|()| ServerMessage::StartGameResponse);
                self.respond(client, name, result);
            }
            ClientRpc::InGameReady => {
                self.dispatch_action(client, name, |lobby, out| lobby.on_ready(client, out));
            }
            ClientRpc::InGameBuzz => {
                self.dispatch_action(client, name, |lobby, out| lobby.on_buzz(client, out));
            }
            ClientRpc::InGameAnswer { answer } => {
                self.dispatch_action(client, name, |lobby, out| {
                    lobby.on_answer(client, answer, out)
                });
            }
            ClientRpc::InGameChoosePassOrPlay { play } => {
                self.dispatch_action(client, name, |lobby, out| {
                    lobby.on_choose_pass_or_play(client, play, out)
                });
            }
        }
    }

    fn respond(&self, client: ClientId, rpc: &str, result: Result<ServerMessage, LobbyError>) {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(client_id = %client, rpc, error = %e, "request refused");
                e.to_message()
            }
        };
        self.clients.send(client, msg);
    }

    fn dispatch_action(
        &mut self,
        client: ClientId,
        rpc: &str,
        action: impl FnOnce(&mut Lobby, &Broadcaster<'_>) -> Result<(), ActionRejected>,
    ) {
        let Some(game_id) = self.clients.game_of(client) else {
            tracing::debug!(client_id = %client, rpc, "action from client outside any game, dropped");
            return;
        };
        let Some(lobby) = self.lobbies.get_mut(&game_id) else {
            return;
        };

        let out = Broadcaster::new(&self.clients);
        if let Err(reason) = action(lobby, &out) {
            tracing::debug!(%game_id, client_id = %client, rpc, %reason, "action rejected");
        }
    }

    // -----------------------------------------------------------------------
    // Lobby management
    // -----------------------------------------------------------------------

    fn list_games(&self) -> Vec<GameMetadata> {
        self.lobbies
            .values()
            .filter(|l| l.lobby_stage().is_joinable())
            .map(Lobby::metadata)
            .collect()
    }

    fn get_game(&self, game_id: GameId) -> Result<ServerMessage, LobbyError> {
        let lobby = self
            .lobbies
            .get(&game_id)
            .filter(|l| l.lobby_stage() != LobbyStage::Dead)
            .ok_or(LobbyError::GameNotFound(game_id))?;
        Ok(ServerMessage::GetGameResponse {
            game: lobby.metadata(),
            players: lobby.roster(),
        })
    }

    fn create_game(
        &mut self,
        client: ClientId,
        name: &str,
        owner_name: &str,
        is_self_hosted: bool,
    ) -> Result<GameId, LobbyError> {
        if let Some(current) = self.clients.game_of(client) {
            return Err(LobbyError::AlreadyInGame(client, current));
        }
        if self.lobbies.len() >= self.limits.max_games {
            return Err(LobbyError::TooManyGames(self.limits.max_games));
        }
        let name = sanitize_name(name, self.limits.max_name_len)?;
        let owner_name = sanitize_name(owner_name, self.limits.max_name_len)?;

        self.next_game_id += 1;
        let game_id = GameId(self.next_game_id);
        let questions = self
            .questions
            .deal(self.config.rounds as usize, &mut self.rng);

        let lobby = Lobby::new(
            game_id,
            LobbyProperties {
                owner: client,
                name,
                is_self_hosted,
            },
            owner_name,
            self.config.clone(),
            questions,
        );
        self.lobbies.insert(game_id, lobby);
        self.clients.set_game(client, Some(game_id));

        tracing::info!(%game_id, owner = %client, games = self.lobbies.len(), "lobby created");
        Ok(game_id)
    }

    fn join_game(
        &mut self,
        client: ClientId,
        game_id: GameId,
        player_name: &str,
    ) -> Result<GameMetadata, LobbyError> {
        if let Some(current) = self.clients.game_of(client) {
            return Err(LobbyError::AlreadyInGame(client, current));
        }
        let name = sanitize_name(player_name, self.limits.max_name_len)?;
        let lobby = live_lobby(&mut self.lobbies, game_id)?;

        lobby.add_player(client, name, &self.limits)?;
        let metadata = lobby.metadata();
        self.clients.set_game(client, Some(game_id));
        Ok(metadata)
    }

    fn swap_team(
        &mut self,
        client: ClientId,
        game_id: GameId,
        target: ClientId,
    ) -> Result<(), LobbyError> {
        let lobby = live_lobby(&mut self.lobbies, game_id)?;
        lobby.swap_team(client, target, &self.limits)?;

        let update = ServerMessage::GetGameResponse {
            game: lobby.metadata(),
            players: lobby.roster(),
        };
        Broadcaster::new(&self.clients).broadcast(&lobby.game().players, &update);
        Ok(())
    }

    fn leave_game(&mut self, client: ClientId) -> Result<(), LobbyError> {
        let game_id = self
            .clients
            .game_of(client)
            .ok_or(LobbyError::NotInGame(client))?;
        self.clients.set_game(client, None);

        let lobby = self
            .lobbies
            .get_mut(&game_id)
            .ok_or(LobbyError::GameNotFound(game_id))?;
        lobby.remove_player(client, &Broadcaster::new(&self.clients))
    }

    fn start_game(&mut self, client: ClientId, game_id: GameId) -> Result<(), LobbyError> {
        let lobby = live_lobby(&mut self.lobbies, game_id)?;
        lobby.start(client, &self.limits, &Broadcaster::new(&self.clients))
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Advances every lobby by `dt` and removes the dead ones.
    pub fn tick(&mut self, dt: Duration) {
        let out = Broadcaster::new(&self.clients);
        for lobby in self.lobbies.values_mut() {
            lobby.tick(dt, &out);
        }

        let dead: Vec<GameId> = self
            .lobbies
            .values()
            .filter(|l| l.lobby_stage() == LobbyStage::Dead)
            .map(Lobby::id)
            .collect();
        for game_id in dead {
            if let Some(lobby) = self.lobbies.remove(&game_id) {
                for player in &lobby.game().players {
                    self.clients.set_game(player.id, None);
                }
                tracing::info!(%game_id, games = self.lobbies.len(), "lobby removed");
            }
        }
    }
}

fn live_lobby(
    lobbies: &mut BTreeMap<GameId, Lobby>,
    game_id: GameId,
) -> Result<&mut Lobby, LobbyError> {
    lobbies
        .get_mut(&game_id)
        .filter(|l| l.lobby_stage() != LobbyStage::Dead)
        .ok_or(LobbyError::GameNotFound(game_id))
}

/// Trims whitespace, drops control characters, and enforces the length
/// limit.
fn sanitize_name(raw: &str, max_len: usize) -> Result<String, LobbyError> {
    let name: String = raw.trim().chars().filter(|c| !c.is_control()).collect();
    if name.is_empty() {
        return Err(LobbyError::InvalidName("name is empty".into()));
    }
    if name.chars().count() > max_len {
        return Err(LobbyError::InvalidName(format!(
            "name is longer than {max_len} characters"
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[test]
    fn test_zero_rounds_config_still_deals_a_question() {
        let config = LobbyConfig {
            rounds: 0,
            ..LobbyConfig::default()
        };
        let mut data = ServerData::new(config, ServerLimits::default(), QuestionBank::builtin());
        let (tx, _rx) = mpsc::unbounded_channel();
        let owner = data.add_client(tx).unwrap();

        let game_id = data.create_game(owner, "g", "host", false).unwrap();

        assert_eq!(data.config.rounds, 1);
        assert_eq!(data.lobby(game_id).unwrap().questions.len(), 1);
    }

    #[test]
    fn test_remove_client_with_stale_game_still_drops_client() {
        let mut data =
            ServerData::new(LobbyConfig::default(), ServerLimits::default(), QuestionBank::builtin());
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = data.add_client(tx).unwrap();
        data.clients.set_game(id, Some(GameId(42)));

        data.remove_client(id);

        assert_eq!(data.client_count(), 0);
        assert!(!data.clients().contains(id));
    }

    #[test]
    fn test_sanitize_name_trims() {
        assert_eq!(sanitize_name("  Ana \n", 64).unwrap(), "Ana");
    }

    #[test]
    fn test_sanitize_name_rejects_blank() {
        assert!(matches!(
            sanitize_name("   ", 64),
            Err(LobbyError::InvalidName(_))
        ));
    }

    #[test]
    fn test_sanitize_name_rejects_too_long() {
        assert!(sanitize_name("abcdef", 5).is_err());
        assert!(sanitize_name("abcde", 5).is_ok());
    }

    #[test]
    fn test_sanitize_name_drops_control_chars() {
        assert_eq!(sanitize_name("A\u{7}na", 64).unwrap(), "Ana");
    }
}
