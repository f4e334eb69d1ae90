//! The authoritative game-session core for Fracas.
//!
//! Everything here is synchronous and free of I/O. The server loop owns a
//! single [`ServerData`], feeds it client RPCs and calls
//! [`ServerData::tick`] with the measured time since the previous tick.
//! Outbound messages leave through per-client channels.
//!
//! # Key types
//!
//! - [`ServerData`]: owns every lobby and client record, routes RPCs
//! - [`Lobby`]: one game session with its state, stage and waiter
//! - [`GameState`]: round data and the read-only queries stages use
//! - [`StageId`]: the closed set of stages, dispatched by `match`
//! - [`Waiter`]: a deadline-bound wait for one client action
//! - [`Broadcaster`]: fan-out to a lobby's roster
//! - [`QuestionBank`]: questions dealt to lobbies

mod broadcast;
mod clients;
mod config;
mod error;
mod game;
mod lobby;
mod questions;
mod server_data;
mod stage;
mod waiter;

pub use broadcast::{Broadcaster, PeerSender};
pub use clients::{ClientRecord, ClientRegistry};
pub use config::{LobbyConfig, LobbyStage, ServerLimits};
pub use error::{ActionRejected, LobbyError, QuestionError};
pub use game::{
    Answer, GameState, MAX_ANSWER_LEN, Player, RoundStage, clip_answer, normalize_answer,
};
pub use lobby::{Lobby, LobbyProperties};
pub use questions::{MAX_ANSWERS, Question, QuestionBank, QuestionFormat};
pub use server_data::ServerData;
pub use stage::StageId;
pub use waiter::{Waiter, WaiterKind};
