//! Wire protocol for the Fracas game server.
//!
//! This crate is the vocabulary shared by clients and the server:
//!
//! - **Identity** ([`ClientId`], [`GameId`], [`Family`]): who and which team.
//! - **Messages** ([`ClientRpc`], [`ServerMessage`]): every RPC a client may
//!   issue and every message the server may push, one variant each.
//! - **Framing** ([`Envelope`]): sequence number and timestamp around a body.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, typed values out.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets or lobbies:
//!
//! ```text
//! Transport (frames) → Protocol (Envelope<ClientRpc>) → Lobby (stage machine)
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{ClientRpc, ServerMessage};
pub use types::{ClientId, Envelope, Family, GameId, GameMetadata, PlayerInfo};
