//! Lobby timing, server capacity limits, and the lobby lifecycle.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::WaiterKind;

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Per-lobby game settings and waiter deadlines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyConfig {
    /// Rounds played before the game ends.
    pub rounds: u32,

    /// How long the face-off players have to buzz.
    pub buzz_timeout: Duration,

    /// How long the designated answerer has to answer.
    pub answer_timeout: Duration,

    /// How long the face-off winner has to choose pass or play.
    pub pass_or_play_timeout: Duration,

    /// How long to wait for every client to report ready before the queued
    /// stage runs anyway.
    pub all_ready_timeout: Duration,

    /// How long an ended lobby lingers before it is removed.
    pub end_game_linger: Duration,

    /// Interval between `GameStatePing` snapshots.
    pub heartbeat_interval: Duration,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            rounds: 3,
            buzz_timeout: Duration::from_secs(20),
            answer_timeout: Duration::from_secs(15),
            pass_or_play_timeout: Duration::from_secs(15),
            all_ready_timeout: Duration::from_secs(30),
            end_game_linger: Duration::from_secs(10 * 60),
            heartbeat_interval: Duration::from_secs(1),
        }
    }
}

impl LobbyConfig {
    /// Clamps out-of-range values. Called by [`ServerData::new`].
    ///
    /// [`ServerData::new`]: crate::ServerData::new
    pub fn validated(mut self) -> Self {
        if self.rounds == 0 {
            tracing::warn!("rounds must be at least 1, clamping");
            self.rounds = 1;
        }
        self
    }

    /// The deadline a waiter of `kind` is armed with.
    pub fn deadline(&self, kind: WaiterKind) -> Duration {
        match kind {
            WaiterKind::Buzz => self.buzz_timeout,
            WaiterKind::Answer => self.answer_timeout,
            WaiterKind::PassOrPlay => self.pass_or_play_timeout,
            WaiterKind::AllReady => self.all_ready_timeout,
            WaiterKind::EndGame => self.end_game_linger,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerLimits
// ---------------------------------------------------------------------------

/// Capacity limits enforced at the lobby-management boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerLimits {
    pub max_games: usize,
    /// Both families together. Each family may hold at most half.
    pub max_players_per_game: usize,
    pub max_clients: usize,
    /// Longest accepted game or player name, in characters, after trimming.
    pub max_name_len: usize,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_games: 128,
            max_players_per_game: 12,
            max_clients: 128 * 12,
            max_name_len: 64,
        }
    }
}

impl ServerLimits {
    pub fn max_per_family(&self) -> usize {
        self.max_players_per_game / 2
    }
}

// ---------------------------------------------------------------------------
// LobbyStage
// ---------------------------------------------------------------------------

/// Lifecycle of a lobby. Transitions only move forward:
///
/// ```text
/// NotStarted → InGame → Ended → Dead
/// ```
///
/// A lobby may also skip from `NotStarted` straight to `Ended` when its
/// owner leaves before starting. `Dead` lobbies are removed on the next
/// server tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyStage {
    NotStarted,
    InGame,
    Ended,
    Dead,
}

impl LobbyStage {
    /// Only lobbies that have not started accept players or team swaps.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::NotStarted)
    }

    pub fn is_over(&self) -> bool {
        matches!(self, Self::Ended | Self::Dead)
    }
}

impl fmt::Display for LobbyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::InGame => write!(f, "InGame"),
            Self::Ended => write!(f, "Ended"),
            Self::Dead => write!(f, "Dead"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_config_validated_clamps_zero_rounds() {
        let config = LobbyConfig {
            rounds: 0,
            ..LobbyConfig::default()
        };
        assert_eq!(config.validated().rounds, 1);
        assert_eq!(LobbyConfig::default().validated(), LobbyConfig::default());
    }

    #[test]
    fn test_lobby_config_defaults() {
        let config = LobbyConfig::default();
        assert_eq!(config.rounds, 3);
        assert_eq!(config.deadline(WaiterKind::Buzz), Duration::from_secs(20));
        assert_eq!(config.deadline(WaiterKind::Answer), Duration::from_secs(15));
        assert_eq!(config.deadline(WaiterKind::AllReady), Duration::from_secs(30));
        assert_eq!(config.deadline(WaiterKind::EndGame), Duration::from_secs(600));
    }

    #[test]
    fn test_server_limits_defaults() {
        let limits = ServerLimits::default();
        assert_eq!(limits.max_games, 128);
        assert_eq!(limits.max_players_per_game, 12);
        assert_eq!(limits.max_per_family(), 6);
        assert_eq!(limits.max_clients, 1536);
    }

    #[test]
    fn test_lobby_stage_is_joinable() {
        assert!(LobbyStage::NotStarted.is_joinable());
        assert!(!LobbyStage::InGame.is_joinable());
        assert!(!LobbyStage::Ended.is_joinable());
        assert!(!LobbyStage::Dead.is_joinable());
    }

    #[test]
    fn test_lobby_stage_is_over() {
        assert!(!LobbyStage::InGame.is_over());
        assert!(LobbyStage::Ended.is_over());
        assert!(LobbyStage::Dead.is_over());
    }

    #[test]
    fn test_lobby_stage_display() {
        assert_eq!(LobbyStage::NotStarted.to_string(), "NotStarted");
        assert_eq!(LobbyStage::Dead.to_string(), "Dead");
    }
}
