//! The RPC surface: what clients send and what the server pushes back.
//!
//! Both enums are internally tagged, so every message is a flat JSON object
//! whose `type` field names the RPC:
//!
//! ```text
//! { "type": "InGameAnswer", "answer": "a dog" }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ClientId, Family, GameId, GameMetadata, PlayerInfo};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Every request a client can make.
///
/// The lobby-management RPCs (`CreateGame` … `StartGame`) always get a
/// response or an `Error`. The `InGame*` actions never do: an action the
/// server is not waiting for is dropped without a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientRpc {
    ListGames,
    GetGame {
        game_id: GameId,
    },
    CreateGame {
        name: String,
        owner_name: String,
        is_self_hosted: bool,
    },
    JoinGame {
        game_id: GameId,
        player_name: String,
    },
    /// Move a player to the other family before the game starts.
    SwapTeam {
        game_id: GameId,
        user_id: ClientId,
    },
    LeaveGame,
    StartGame {
        game_id: GameId,
    },
    InGameReady,
    InGameAnswer {
        answer: String,
    },
    InGameBuzz,
    InGameChoosePassOrPlay {
        play: bool,
    },
}

impl ClientRpc {
    /// The RPC name, used as a structured logging field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListGames => "ListGames",
            Self::GetGame { .. } => "GetGame",
            Self::CreateGame { .. } => "CreateGame",
            Self::JoinGame { .. } => "JoinGame",
            Self::SwapTeam { .. } => "SwapTeam",
            Self::LeaveGame => "LeaveGame",
            Self::StartGame { .. } => "StartGame",
            Self::InGameReady => "InGameReady",
            Self::InGameAnswer { .. } => "InGameAnswer",
            Self::InGameBuzz => "InGameBuzz",
            Self::InGameChoosePassOrPlay { .. } => "InGameChoosePassOrPlay",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Every message the server sends.
///
/// Responses go only to the requester. `InGame*`, `GameStarted`,
/// `PlayerLeft` and `GameStatePing` are broadcast to a lobby's roster; each
/// `InGame*` broadcast corresponds to exactly one stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    // -- Responses --
    ListGamesResponse {
        games: Vec<GameMetadata>,
    },
    GetGameResponse {
        game: GameMetadata,
        players: Vec<PlayerInfo>,
    },
    CreateGameResponse {
        game_id: GameId,
        owner_id: ClientId,
    },
    JoinGameResponse {
        game: GameMetadata,
    },
    LeaveGameResponse,
    StartGameResponse,
    /// A lobby-management request was refused. `code` follows HTTP
    /// conventions (400 bad request, 403 forbidden, 404 not found,
    /// 409 conflict, 503 capacity).
    Error {
        code: u16,
        message: String,
    },

    // -- Lobby notifications --
    GameStarted {
        game_id: GameId,
        your_id: ClientId,
    },
    PlayerLeft {
        user_id: ClientId,
    },
    /// Periodic full-roster snapshot for reconciliation.
    GameStatePing {
        my_id: ClientId,
        players: Vec<PlayerInfo>,
    },

    // -- Stage transitions --
    InGameStartRound {
        round: u32,
    },
    InGameStartFaceoff {
        faceoffer_0_id: ClientId,
        faceoffer_1_id: ClientId,
    },
    InGameAskQuestion {
        question: String,
        num_answers: u32,
    },
    InGamePlayerBuzzed {
        user_id: ClientId,
        buzzing_family: Family,
    },
    InGamePrepForPromptForAnswer {
        family: Family,
        player_position: u32,
    },
    InGamePromptForAnswer {
        user_id: ClientId,
        /// How long the answerer has, in milliseconds.
        time_limit_ms: u64,
    },
    /// Echo of an accepted answer. `user_id` is `null` when the answer was
    /// synthesized because the answerer ran out of time.
    InGamePlayerAnswered {
        user_id: Option<ClientId>,
        answer: String,
    },
    InGamePromptPassOrPlay {
        user_id: ClientId,
    },
    InGamePlayerChosePassOrPlay {
        play: bool,
    },
    InGameStartPlay {
        family: Family,
    },
    InGameStartSteal {
        family: Family,
    },
    InGameFlipAnswer {
        answer_index: u32,
        answer: String,
        score: u32,
    },
    InGameEggghhhh {
        n_incorrects: u32,
    },
    InGameEndRound {
        round_winner: Option<Family>,
        family0_score: u32,
        family1_score: u32,
    },
    InGameEndGame {
        game_winner: Option<Family>,
        family0_score: u32,
        family1_score: u32,
    },
}

impl ServerMessage {
    /// Builds an `InGamePromptForAnswer` from a waiter deadline.
    pub fn prompt_for_answer(user_id: ClientId, time_limit: Duration) -> Self {
        Self::InGamePromptForAnswer {
            user_id,
            time_limit_ms: time_limit.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_rpc_json_shape() {
        let rpc = ClientRpc::JoinGame {
            game_id: GameId(4),
            player_name: "Ana".into(),
        };
        let json = serde_json::to_value(&rpc).unwrap();
        assert_eq!(json["type"], "JoinGame");
        assert_eq!(json["game_id"], 4);
        assert_eq!(json["player_name"], "Ana");
    }

    #[test]
    fn test_unit_rpc_decodes_from_bare_tag() {
        let rpc: ClientRpc = serde_json::from_str(r#"{"type":"InGameBuzz"}"#).unwrap();
        assert_eq!(rpc, ClientRpc::InGameBuzz);
        assert_eq!(rpc.name(), "InGameBuzz");
    }

    #[test]
    fn test_end_round_without_winner_is_null() {
        let msg = ServerMessage::InGameEndRound {
            round_winner: None,
            family0_score: 10,
            family1_score: 0,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json["round_winner"].is_null());
        assert_eq!(json["family0_score"], 10);
    }

    #[test]
    fn test_prompt_for_answer_carries_limit_in_millis() {
        let msg = ServerMessage::prompt_for_answer(ClientId(2), Duration::from_secs(15));
        assert_eq!(
            msg,
            ServerMessage::InGamePromptForAnswer {
                user_id: ClientId(2),
                time_limit_ms: 15_000,
            }
        );
    }

    #[test]
    fn test_player_answered_timeout_has_null_author() {
        let msg = ServerMessage::InGamePlayerAnswered {
            user_id: None,
            answer: "...".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json["user_id"].is_null());
    }
}
