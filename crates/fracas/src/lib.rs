//! # Fracas
//!
//! WebSocket server for Fracas, a two-family trivia game in the style of a
//! television game show.
//!
//! This crate wires the layers together:
//!
//! ```text
//! WebSocket (fracas-transport)
//!   → Envelope<ClientRpc> (fracas-protocol)
//!     → game loop task owning ServerData (fracas-lobby)
//!       ← tick scheduler (fracas-tick)
//! ```
//!
//! Every connection gets a reader task and a writer task. All game state
//! lives in a single game-loop task, so lobbies never need locks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fracas::prelude::*;
//!
//! # async fn run() -> Result<(), FracasError> {
//! let server = FracasServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::FracasError;
pub use server::{FracasServer, FracasServerBuilder};

pub mod prelude {
    pub use crate::{FracasError, FracasServer, FracasServerBuilder};
    pub use fracas_lobby::{LobbyConfig, QuestionBank, QuestionFormat, ServerLimits};
    pub use fracas_protocol::{ClientId, ClientRpc, Envelope, Family, GameId, ServerMessage};
    pub use fracas_tick::{TickConfig, TickPolicy};
}
