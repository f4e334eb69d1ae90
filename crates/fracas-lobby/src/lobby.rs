//! One game session: roster, game state, current stage, and its waiter.

use std::time::Duration;

use fracas_protocol::{ClientId, Family, GameId, GameMetadata, PlayerInfo, ServerMessage};

use crate::{
    ActionRejected, Broadcaster, GameState, LobbyConfig, LobbyError, LobbyStage, Player, Question,
    ServerLimits, StageId, Waiter, WaiterKind, clip_answer,
};

/// Set by the creator; never changes for the life of the lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyProperties {
    pub owner: ClientId,
    pub name: String,
    pub is_self_hosted: bool,
}

/// A game session.
///
/// At most one [`Waiter`] is armed at any time. While a stage is queued
/// behind the ready handshake the waiter is `AllReady`; while a stage waits
/// on a client action the waiter is the kind that stage arms.
#[derive(Debug)]
pub struct Lobby {
    id: GameId,
    properties: LobbyProperties,
    pub(crate) config: LobbyConfig,
    pub(crate) game: GameState,
    pub(crate) questions: Vec<Question>,
    /// The stage most recently entered.
    pub(crate) stage: Option<StageId>,
    /// The stage queued by `set_next_stage`, not yet entered.
    next_stage: Option<StageId>,
    waiter: Option<Waiter>,
    pub(crate) lobby_stage: LobbyStage,
    ready_to_delete: bool,
    since_ping: Duration,
}

impl Lobby {
    /// Creates a lobby with its owner as the first member of family 0.
    /// `questions` are used in order, one per round.
    pub fn new(
        id: GameId,
        properties: LobbyProperties,
        owner_name: String,
        config: LobbyConfig,
        questions: Vec<Question>,
    ) -> Self {
        let owner = Player {
            id: properties.owner,
            name: owner_name,
            family: Family::Zero,
            ready: false,
        };
        Self {
            id,
            properties,
            config,
            game: GameState {
                players: vec![owner],
                ..GameState::default()
            },
            questions,
            stage: None,
            next_stage: None,
            waiter: None,
            lobby_stage: LobbyStage::NotStarted,
            ready_to_delete: false,
            since_ping: Duration::ZERO,
        }
    }

    // -- Accessors --

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn properties(&self) -> &LobbyProperties {
        &self.properties
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn lobby_stage(&self) -> LobbyStage {
        self.lobby_stage
    }

    pub fn stage(&self) -> Option<StageId> {
        self.stage
    }

    pub fn next_stage(&self) -> Option<StageId> {
        self.next_stage
    }

    pub fn waiter(&self) -> Option<&Waiter> {
        self.waiter.as_ref()
    }

    pub fn is_ready_to_delete(&self) -> bool {
        self.ready_to_delete
    }

    pub fn is_empty(&self) -> bool {
        self.game.players.is_empty()
    }

    pub fn metadata(&self) -> GameMetadata {
        let owner = self
            .game
            .player(self.properties.owner)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        GameMetadata {
            id: self.id,
            name: self.properties.name.clone(),
            owner,
            is_self_hosted: self.properties.is_self_hosted,
            num_players: self.game.players.len() as u32,
        }
    }

    pub fn roster(&self) -> Vec<PlayerInfo> {
        self.game.roster()
    }

    /// Checks that the armed waiter agrees with the stage bookkeeping.
    pub fn waiter_is_consistent(&self) -> bool {
        let kind = self.waiter.map(|w| w.kind);
        match (self.lobby_stage, kind) {
            (LobbyStage::NotStarted | LobbyStage::Dead, None) => self.next_stage.is_none(),
            (LobbyStage::InGame, None) => self.next_stage.is_some_and(|s| !s.requires_ready()),
            (LobbyStage::InGame, Some(WaiterKind::AllReady)) => self.next_stage.is_some(),
            (LobbyStage::InGame, Some(kind)) => {
                self.next_stage.is_none() && self.stage.and_then(StageId::arms) == Some(kind)
            }
            (LobbyStage::Ended, Some(WaiterKind::EndGame)) => {
                self.next_stage.is_none() && self.stage == Some(StageId::EndGame)
            }
            _ => false,
        }
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    /// Adds a player to the smaller family (family 0 on a tie).
    pub fn add_player(
        &mut self,
        id: ClientId,
        name: String,
        limits: &ServerLimits,
    ) -> Result<Family, LobbyError> {
        if !self.lobby_stage.is_joinable() {
            return Err(LobbyError::AlreadyStarted(self.id));
        }
        if self.game.contains(id) {
            return Err(LobbyError::AlreadyInGame(id, self.id));
        }
        if self.game.players.len() >= limits.max_players_per_game {
            return Err(LobbyError::GameFull(self.id));
        }

        let family = if self.game.family_size(Family::One) < self.game.family_size(Family::Zero) {
            Family::One
        } else {
            Family::Zero
        };
        if self.game.family_size(family) >= limits.max_per_family() {
            return Err(LobbyError::GameFull(self.id));
        }

        self.game.players.push(Player {
            id,
            name,
            family,
            ready: false,
        });
        tracing::info!(
            game_id = %self.id,
            client_id = %id,
            %family,
            players = self.game.players.len(),
            "player joined"
        );
        Ok(family)
    }

    /// Moves `target` to the other family. Players may move themselves; the
    /// owner may move anyone.
    pub fn swap_team(
        &mut self,
        requester: ClientId,
        target: ClientId,
        limits: &ServerLimits,
    ) -> Result<Family, LobbyError> {
        if !self.lobby_stage.is_joinable() {
            return Err(LobbyError::AlreadyStarted(self.id));
        }
        if requester != target && requester != self.properties.owner {
            return Err(LobbyError::NotOwner(requester, self.id));
        }
        let from = self
            .game
            .player(target)
            .map(|p| p.family)
            .ok_or(LobbyError::PlayerNotFound(target, self.id))?;
        let to = from.other();
        if self.game.family_size(to) >= limits.max_per_family() {
            return Err(LobbyError::TeamFull(to));
        }

        if let Some(player) = self.game.players.iter_mut().find(|p| p.id == target) {
            player.family = to;
        }
        tracing::debug!(game_id = %self.id, client_id = %target, family = %to, "player swapped team");
        Ok(to)
    }

    /// Starts the game: sends `GameStarted` to each player and queues the
    /// first round behind the ready handshake.
    pub fn start(
        &mut self,
        requester: ClientId,
        limits: &ServerLimits,
        out: &Broadcaster<'_>,
    ) -> Result<(), LobbyError> {
        if requester != self.properties.owner {
            return Err(LobbyError::NotOwner(requester, self.id));
        }
        if !self.lobby_stage.is_joinable() {
            return Err(LobbyError::AlreadyStarted(self.id));
        }
        let zero = self.game.family_size(Family::Zero);
        let one = self.game.family_size(Family::One);
        let cap = limits.max_per_family();
        if zero == 0 || one == 0 || zero > cap || one > cap {
            return Err(LobbyError::TeamsUnbalanced(zero, one));
        }

        let players = std::mem::take(&mut self.game.players);
        self.game = GameState {
            players,
            ..GameState::default()
        };
        self.lobby_stage = LobbyStage::InGame;

        let game_id = self.id;
        out.broadcast_with(&self.game.players, |your_id| ServerMessage::GameStarted {
            game_id,
            your_id,
        });
        tracing::info!(game_id = %self.id, family0 = zero, family1 = one, "game started");

        self.set_next_stage(StageId::StartRound);
        Ok(())
    }

    /// Removes a player who left or disconnected.
    ///
    /// The game ends early when the owner leaves or a family empties. An
    /// empty lobby is marked dead. If the departure completes the ready
    /// handshake, the queued stage runs.
    pub fn remove_player(&mut self, id: ClientId, out: &Broadcaster<'_>) -> Result<(), LobbyError> {
        let index = self
            .game
            .players
            .iter()
            .position(|p| p.id == id)
            .ok_or(LobbyError::PlayerNotFound(id, self.id))?;
        self.game.players.remove(index);

        tracing::info!(
            game_id = %self.id,
            client_id = %id,
            players = self.game.players.len(),
            "player left"
        );

        if self.game.players.is_empty() {
            self.mark_dead();
            return Ok(());
        }
        out.broadcast(&self.game.players, &ServerMessage::PlayerLeft { user_id: id });

        let owner_left = id == self.properties.owner;
        match self.lobby_stage {
            LobbyStage::NotStarted if owner_left => self.end_early(out),
            LobbyStage::InGame => {
                let family_emptied = Family::BOTH
                    .into_iter()
                    .any(|f| self.game.family_size(f) == 0);
                if owner_left || family_emptied {
                    self.end_early(out);
                } else if self.is_waiting_on(WaiterKind::AllReady) && self.game.all_ready() {
                    self.waiter = None;
                    self.run_next_stage(out);
                }
            }
            _ => {}
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // In-game actions
    // -----------------------------------------------------------------------

    /// Marks `sender` ready. Once everyone is ready the queued stage runs.
    pub fn on_ready(&mut self, sender: ClientId, out: &Broadcaster<'_>) -> Result<(), ActionRejected> {
        self.validate(sender, WaiterKind::AllReady)?;

        if let Some(player) = self.game.players.iter_mut().find(|p| p.id == sender) {
            player.ready = true;
        }
        if self.game.all_ready() {
            self.waiter = None;
            self.run_next_stage(out);
        }
        Ok(())
    }

    /// Accepts a buzz from either face-off player.
    pub fn on_buzz(&mut self, sender: ClientId, out: &Broadcaster<'_>) -> Result<(), ActionRejected> {
        self.validate(sender, WaiterKind::Buzz)?;
        let family = self
            .game
            .faceoff_family_of(sender)
            .ok_or(ActionRejected::WrongSender(sender))?;

        self.disarm();
        self.game.buzzing_family = Some(family);
        out.broadcast(
            &self.game.players,
            &ServerMessage::InGamePlayerBuzzed {
                user_id: sender,
                buzzing_family: family,
            },
        );
        self.set_next_stage(StageId::PrepForAnswer);
        Ok(())
    }

    /// Accepts an answer from the designated answerer. The text is trimmed
    /// and clipped to [`MAX_ANSWER_LEN`](crate::MAX_ANSWER_LEN) bytes.
    pub fn on_answer(
        &mut self,
        sender: ClientId,
        answer: String,
        out: &Broadcaster<'_>,
    ) -> Result<(), ActionRejected> {
        self.validate(sender, WaiterKind::Answer)?;
        if self.game.who_can_answer() != Some(sender) {
            return Err(ActionRejected::WrongSender(sender));
        }

        self.disarm();
        let answer = clip_answer(&answer).to_string();
        out.broadcast(
            &self.game.players,
            &ServerMessage::InGamePlayerAnswered {
                user_id: Some(sender),
                answer: answer.clone(),
            },
        );
        self.game.last_answer = answer;
        self.game.last_answer_by = Some(sender);
        self.set_next_stage(StageId::RespondToAnswer);
        Ok(())
    }

    /// Accepts the face-off winner's choice.
    pub fn on_choose_pass_or_play(
        &mut self,
        sender: ClientId,
        play: bool,
        out: &Broadcaster<'_>,
    ) -> Result<(), ActionRejected> {
        self.validate(sender, WaiterKind::PassOrPlay)?;
        if self.game.who_won_faceoff() != Some(sender) {
            return Err(ActionRejected::WrongSender(sender));
        }

        self.disarm();
        self.apply_pass_or_play(play, out);
        Ok(())
    }

    fn validate(&self, sender: ClientId, expected: WaiterKind) -> Result<(), ActionRejected> {
        if !self.game.contains(sender) {
            return Err(ActionRejected::NotAMember(sender));
        }
        if self.lobby_stage != LobbyStage::InGame {
            return Err(ActionRejected::NotInGame);
        }
        match self.waiter {
            None => Err(ActionRejected::NoWaiter),
            Some(w) if w.kind != expected => Err(ActionRejected::WrongWaiter {
                expected,
                armed: w.kind,
            }),
            Some(_) => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Advances the lobby clock by `dt`.
    ///
    /// Sends the heartbeat ping when due, then either advances the armed
    /// waiter (firing its default on expiry) or, with no waiter armed, runs
    /// the queued stage.
    pub fn tick(&mut self, dt: Duration, out: &Broadcaster<'_>) {
        if self.lobby_stage == LobbyStage::Dead {
            return;
        }

        self.since_ping += dt;
        if self.since_ping >= self.config.heartbeat_interval {
            self.since_ping = Duration::ZERO;
            self.ping(out);
        }

        if let Some(waiter) = self.waiter.as_mut() {
            if waiter.advance(dt) {
                let kind = waiter.kind;
                self.waiter = None;
                tracing::debug!(game_id = %self.id, waiter = %kind, "waiter timed out");
                self.on_timeout(kind, out);
            }
            return;
        }

        if self.next_stage.is_some() {
            self.run_next_stage(out);
        }
    }

    fn on_timeout(&mut self, kind: WaiterKind, out: &Broadcaster<'_>) {
        match kind {
            WaiterKind::Buzz => {
                self.game.incorrects += 1;
                self.game.round_winner = None;
                out.broadcast(
                    &self.game.players,
                    &ServerMessage::InGameEggghhhh {
                        n_incorrects: self.game.incorrects,
                    },
                );
                self.set_next_stage(StageId::EndRound);
            }
            WaiterKind::Answer => {
                self.game.last_answer.clear();
                self.game.last_answer_by = None;
                out.broadcast(
                    &self.game.players,
                    &ServerMessage::InGamePlayerAnswered {
                        user_id: None,
                        answer: "...".into(),
                    },
                );
                self.set_next_stage(StageId::RespondToAnswer);
            }
            WaiterKind::PassOrPlay => self.apply_pass_or_play(true, out),
            WaiterKind::AllReady => self.run_next_stage(out),
            WaiterKind::EndGame => self.mark_dead(),
        }
    }

    fn ping(&self, out: &Broadcaster<'_>) {
        let players = self.game.roster();
        out.broadcast_with(&self.game.players, |my_id| ServerMessage::GameStatePing {
            my_id,
            players: players.clone(),
        });
    }

    // -----------------------------------------------------------------------
    // Stage plumbing
    // -----------------------------------------------------------------------

    /// Queues `next`, replacing any armed waiter. Stages behind the ready
    /// handshake clear every ready flag and arm `AllReady`.
    pub(crate) fn set_next_stage(&mut self, next: StageId) {
        self.waiter = None;
        self.next_stage = Some(next);
        if next.requires_ready() {
            for player in &mut self.game.players {
                player.ready = false;
            }
            self.arm(WaiterKind::AllReady);
        }
        tracing::debug!(game_id = %self.id, stage = %next, "stage queued");
    }

    pub(crate) fn arm(&mut self, kind: WaiterKind) {
        let deadline = self.config.deadline(kind);
        self.waiter = Some(Waiter::new(kind, deadline));
        tracing::debug!(game_id = %self.id, waiter = %kind, ?deadline, "waiter armed");
    }

    fn disarm(&mut self) {
        if let Some(w) = self.waiter.take() {
            tracing::debug!(game_id = %self.id, waiter = %w.kind, "waiter disarmed");
        }
    }

    fn is_waiting_on(&self, kind: WaiterKind) -> bool {
        self.waiter.is_some_and(|w| w.kind == kind)
    }

    fn run_next_stage(&mut self, out: &Broadcaster<'_>) {
        let next = self
            .next_stage
            .take()
            .expect("ready handshake completed with no stage queued");
        self.run_stage(next, out);
    }

    pub(crate) fn apply_pass_or_play(&mut self, play: bool, out: &Broadcaster<'_>) {
        let winner = self
            .game
            .faceoff_winning_family
            .expect("pass or play decided without a face-off winner");
        self.game.playing_family = Some(if play { winner } else { winner.other() });
        out.broadcast(
            &self.game.players,
            &ServerMessage::InGamePlayerChosePassOrPlay { play },
        );
        self.set_next_stage(StageId::StartPlay);
    }

    /// Ends the game now, whatever stage it is in.
    pub(crate) fn end_early(&mut self, out: &Broadcaster<'_>) {
        self.waiter = None;
        self.next_stage = None;
        self.run_stage(StageId::EndGame, out);
    }

    fn mark_dead(&mut self) {
        self.waiter = None;
        self.next_stage = None;
        self.lobby_stage = LobbyStage::Dead;
        self.ready_to_delete = true;
        tracing::info!(game_id = %self.id, "lobby ready to delete");
    }
}
