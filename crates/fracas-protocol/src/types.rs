//! Identity and framing types shared by every message.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Server-assigned identifier of one connected client.
///
/// Serialized transparently, so `ClientId(7)` is just `7` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// Identifier of one game session (one lobby).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u32);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Family
// ---------------------------------------------------------------------------

/// One of the two competing teams.
///
/// On the wire a family is its index, `0` or `1`. "No family" (nobody
/// buzzed yet, nobody won the round) is `null`, i.e. `Option<Family>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Family {
    Zero,
    One,
}

impl Family {
    /// Both families in index order.
    pub const BOTH: [Family; 2] = [Family::Zero, Family::One];

    /// The opposing family.
    pub fn other(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }

    /// Index into per-family arrays (`scores`, `current_players`).
    pub fn index(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

impl From<Family> for u8 {
    fn from(family: Family) -> u8 {
        family.index() as u8
    }
}

impl TryFrom<u8> for Family {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Zero),
            1 => Ok(Self::One),
            other => Err(format!("family index must be 0 or 1, got {other}")),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "family-{}", self.index())
    }
}

// ---------------------------------------------------------------------------
// Lobby descriptions
// ---------------------------------------------------------------------------

/// Summary of a lobby, returned by game listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub id: GameId,
    pub name: String,
    /// Display name of the owner.
    pub owner: String,
    pub is_self_hosted: bool,
    pub num_players: u32,
}

/// One roster entry as clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub user_id: ClientId,
    pub name: String,
    pub family: Family,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Frame wrapper around every message in both directions.
///
/// `seq` increments per connection per direction; `timestamp` is
/// milliseconds since the sender started. Neither affects game logic, they
/// exist for ordering checks and debugging on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub seq: u64,
    pub timestamp: u64,
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn new(seq: u64, timestamp: u64, body: T) -> Self {
        Self {
            seq,
            timestamp,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&ClientId(42)).unwrap(), "42");
        let id: ClientId = serde_json::from_str("42").unwrap();
        assert_eq!(id, ClientId(42));
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(ClientId(7).to_string(), "C-7");
        assert_eq!(GameId(3).to_string(), "G-3");
    }

    #[test]
    fn test_family_other_and_index() {
        assert_eq!(Family::Zero.other(), Family::One);
        assert_eq!(Family::One.other(), Family::Zero);
        assert_eq!(Family::Zero.index(), 0);
        assert_eq!(Family::One.index(), 1);
    }

    #[test]
    fn test_family_serializes_as_index() {
        assert_eq!(serde_json::to_string(&Family::One).unwrap(), "1");
        let f: Family = serde_json::from_str("0").unwrap();
        assert_eq!(f, Family::Zero);
    }

    #[test]
    fn test_family_rejects_out_of_range_index() {
        let result: Result<Family, _> = serde_json::from_str("2");
        assert!(result.is_err());
    }

    #[test]
    fn test_no_family_is_null() {
        let none: Option<Family> = None;
        assert_eq!(serde_json::to_string(&none).unwrap(), "null");
    }
}
