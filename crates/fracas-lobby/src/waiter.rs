//! Deadline-bound waits.
//!
//! Waiting is state, never a blocked call. A lobby holds at most one
//! [`Waiter`]; every tick advances its clock, and either the matching client
//! action or the deadline disarms it. Exactly one of the two wins.

use std::fmt;
use std::time::Duration;

/// What a lobby is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaiterKind {
    /// A face-off player to buzz. Timeout counts as a miss and ends the round.
    Buzz,
    /// The designated answerer. Timeout submits an empty answer.
    Answer,
    /// The face-off winner to choose. Timeout chooses play.
    PassOrPlay,
    /// Every client to report ready. Timeout runs the queued stage anyway.
    AllReady,
    /// The lobby to linger after the game. Timeout marks it for deletion.
    EndGame,
}

impl fmt::Display for WaiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buzz => write!(f, "Buzz"),
            Self::Answer => write!(f, "Answer"),
            Self::PassOrPlay => write!(f, "PassOrPlay"),
            Self::AllReady => write!(f, "AllReady"),
            Self::EndGame => write!(f, "EndGame"),
        }
    }
}

/// An armed wait with its own clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waiter {
    pub kind: WaiterKind,
    pub deadline: Duration,
    pub elapsed: Duration,
}

impl Waiter {
    pub fn new(kind: WaiterKind, deadline: Duration) -> Self {
        Self {
            kind,
            deadline,
            elapsed: Duration::ZERO,
        }
    }

    /// Adds `dt` to the clock. Returns `true` once the deadline is reached.
    pub fn advance(&mut self, dt: Duration) -> bool {
        self.elapsed = self.elapsed.saturating_add(dt);
        self.expired()
    }

    pub fn expired(&self) -> bool {
        self.elapsed >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_sub(self.elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_expires_at_deadline() {
        let mut w = Waiter::new(WaiterKind::Answer, Duration::from_secs(15));
        assert!(!w.advance(Duration::from_secs(10)));
        assert_eq!(w.remaining(), Duration::from_secs(5));
        assert!(w.advance(Duration::from_secs(5)));
        assert!(w.expired());
    }

    #[test]
    fn test_remaining_saturates_past_deadline() {
        let mut w = Waiter::new(WaiterKind::Buzz, Duration::from_secs(1));
        w.advance(Duration::from_secs(3));
        assert_eq!(w.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_zero_deadline_is_immediately_expired() {
        let w = Waiter::new(WaiterKind::AllReady, Duration::ZERO);
        assert!(w.expired());
    }
}
