//! Unified error type for the Fracas server.

use fracas_lobby::{LobbyError, QuestionError};
use fracas_protocol::ProtocolError;
use fracas_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// Each `#[from]` variant lets `?` lift a sub-crate error without a
/// `map_err`.
#[derive(Debug, thiserror::Error)]
pub enum FracasError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lobby refused a request, e.g. the server is full.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// The question bank could not be loaded.
    #[error(transparent)]
    Question(#[from] QuestionError),

    /// The game loop task is gone, so no connection can be served.
    #[error("game loop stopped")]
    GameLoopStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let fracas_err: FracasError = err.into();
        assert!(matches!(fracas_err, FracasError::Transport(_)));
        assert!(fracas_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let fracas_err: FracasError = err.into();
        assert!(matches!(fracas_err, FracasError::Protocol(_)));
    }

    #[test]
    fn test_from_lobby_error() {
        let err = LobbyError::ServerFull(4);
        let fracas_err: FracasError = err.into();
        assert!(matches!(fracas_err, FracasError::Lobby(LobbyError::ServerFull(4))));
    }

    #[test]
    fn test_from_question_error() {
        let fracas_err: FracasError = QuestionError::Empty.into();
        assert!(matches!(fracas_err, FracasError::Question(QuestionError::Empty)));
    }
}
