//! Error types for the lobby layer.
//!
//! Two families of failure are kept apart. [`LobbyError`] is a refused
//! lobby-management request and is reported back to the requester.
//! [`ActionRejected`] is an in-game action the lobby was not waiting for; it
//! is logged and dropped, never surfaced to the client.

use fracas_protocol::{ClientId, Family, GameId, ServerMessage};

use crate::WaiterKind;

/// A lobby-management request that was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// No more client slots on this server.
    #[error("server is full ({0} clients)")]
    ServerFull(usize),

    #[error("too many games ({0} max)")]
    TooManyGames(usize),

    #[error("game {0} is full")]
    GameFull(GameId),

    /// The name was empty after trimming or exceeded the length limit.
    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("game {0} not found")]
    GameNotFound(GameId),

    #[error("client {0} is already in game {1}")]
    AlreadyInGame(ClientId, GameId),

    #[error("client {0} is not in a game")]
    NotInGame(ClientId),

    #[error("client {0} does not own game {1}")]
    NotOwner(ClientId, GameId),

    #[error("game {0} has already started")]
    AlreadyStarted(GameId),

    /// A family is empty or holds more than half the game's capacity.
    #[error("teams are unbalanced ({0} vs {1})")]
    TeamsUnbalanced(usize, usize),

    #[error("{0} is full")]
    TeamFull(Family),

    #[error("player {0} not found in game {1}")]
    PlayerNotFound(ClientId, GameId),
}

impl LobbyError {
    /// HTTP-style status code sent to the client.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidName(_) | Self::TeamsUnbalanced(..) => 400,
            Self::NotOwner(..) => 403,
            Self::GameNotFound(_) | Self::NotInGame(_) | Self::PlayerNotFound(..) => 404,
            Self::AlreadyInGame(..)
            | Self::AlreadyStarted(_)
            | Self::GameFull(_)
            | Self::TeamFull(_) => 409,
            Self::ServerFull(_) | Self::TooManyGames(_) => 503,
        }
    }

    /// The `Error` message sent to the requester.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::Error {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// An in-game action that failed validation and was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionRejected {
    #[error("no waiter is armed")]
    NoWaiter,

    #[error("expected a {expected} waiter, {armed} is armed")]
    WrongWaiter {
        expected: WaiterKind,
        armed: WaiterKind,
    },

    /// The sender is not the player the waiter is waiting on.
    #[error("{0} is not the expected sender")]
    WrongSender(ClientId),

    #[error("{0} is not a member of this lobby")]
    NotAMember(ClientId),

    #[error("lobby is not in game")]
    NotInGame,
}

/// Errors raised while loading a question bank.
#[derive(Debug, thiserror::Error)]
pub enum QuestionError {
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("failed to read question bank: {0}")]
    Io(#[from] std::io::Error),

    #[error("question bank is empty")]
    Empty,
}
