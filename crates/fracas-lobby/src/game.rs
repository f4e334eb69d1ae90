//! Game data and the read-only queries the stage machine relies on.
//!
//! `GameState` carries no behaviour of its own beyond derived queries. Its
//! fields are written only by stage handlers in [`crate::stage`] and by the
//! roster operations of [`crate::Lobby`].

use fracas_protocol::{ClientId, Family, PlayerInfo};

/// A member of a lobby's roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: ClientId,
    pub name: String,
    pub family: Family,
    /// Cleared every time a stage is queued behind the ready handshake.
    pub ready: bool,
}

impl Player {
    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            user_id: self.id,
            name: self.name.clone(),
            family: self.family,
        }
    }
}

/// One entry on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub score: u32,
    /// Flips to `true` exactly once, when the answer is matched.
    pub revealed: bool,
}

impl Answer {
    pub fn new(text: impl Into<String>, score: u32) -> Self {
        Self {
            text: text.into(),
            score,
            revealed: false,
        }
    }
}

/// Phase within a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundStage {
    #[default]
    Start,
    Faceoff,
    Play,
    Steal,
    End,
}

/// All per-game data.
#[derive(Debug, Clone)]
pub struct GameState {
    /// Insertion order. Families are views over this list, so the face-off
    /// pairing and turn order never depend on hashing.
    pub players: Vec<Player>,
    pub question: String,
    pub answers: Vec<Answer>,
    /// `-1` until the first round starts.
    pub round: i32,
    pub round_stage: RoundStage,
    pub this_round_points: u32,
    pub incorrects: u32,
    pub round_winner: Option<Family>,
    /// Per-family turn cursor into that family's roster.
    pub current_players: [usize; 2],
    pub playing_family: Option<Family>,
    pub buzzing_family: Option<Family>,
    pub faceoff_winning_family: Option<Family>,
    /// The face-off pair, family 0 first, fixed when the face-off starts.
    pub faceoff_pair: Option<(ClientId, ClientId)>,
    /// Answers given so far in the current face-off.
    pub faceoff_attempts: u32,
    pub scores: [u32; 2],
    pub last_answer: String,
    /// `None` when the last answer was synthesized on timeout.
    pub last_answer_by: Option<ClientId>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            players: Vec::new(),
            question: String::new(),
            answers: Vec::new(),
            round: -1,
            round_stage: RoundStage::Start,
            this_round_points: 0,
            incorrects: 0,
            round_winner: None,
            current_players: [0, 0],
            playing_family: None,
            buzzing_family: None,
            faceoff_winning_family: None,
            faceoff_pair: None,
            faceoff_attempts: 0,
            scores: [0, 0],
            last_answer: String::new(),
            last_answer_by: None,
        }
    }
}

impl GameState {
    // -- Roster --

    pub fn player(&self, id: ClientId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.player(id).is_some()
    }

    /// Members of `family`, in roster order.
    pub fn family_members(&self, family: Family) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(move |p| p.family == family)
    }

    pub fn family_size(&self, family: Family) -> usize {
        self.family_members(family).count()
    }

    fn family_member_at(&self, family: Family, position: usize) -> Option<ClientId> {
        self.family_members(family).nth(position).map(|p| p.id)
    }

    pub fn all_ready(&self) -> bool {
        self.players.iter().all(|p| p.ready)
    }

    pub fn roster(&self) -> Vec<PlayerInfo> {
        self.players.iter().map(Player::info).collect()
    }

    // -- Face-off --

    /// Roster position of `family`'s face-off player this round.
    fn faceoff_position(&self, family: Family) -> Option<usize> {
        let size = self.family_size(family);
        if size == 0 {
            return None;
        }
        Some(self.round.max(0) as usize % size)
    }

    /// The player `family` sends to this round's face-off, selected as
    /// `round mod family size`.
    pub fn faceoff_player(&self, family: Family) -> Option<ClientId> {
        let position = self.faceoff_position(family)?;
        self.family_member_at(family, position)
    }

    /// The face-off pair, family 0 first. `None` if a family is empty.
    pub fn faceoff_players(&self) -> Option<(ClientId, ClientId)> {
        Some((
            self.faceoff_player(Family::Zero)?,
            self.faceoff_player(Family::One)?,
        ))
    }

    /// `family`'s player in the running face-off. `None` before the
    /// face-off starts or once that player has left.
    pub fn faceoffer(&self, family: Family) -> Option<ClientId> {
        let (zero, one) = self.faceoff_pair?;
        let id = match family {
            Family::Zero => zero,
            Family::One => one,
        };
        self.contains(id).then_some(id)
    }

    /// The family whose face-off player is `id`, if any.
    pub fn faceoff_family_of(&self, id: ClientId) -> Option<Family> {
        Family::BOTH
            .into_iter()
            .find(|&f| self.faceoffer(f) == Some(id))
    }

    pub fn who_buzzed(&self) -> Option<ClientId> {
        self.faceoffer(self.buzzing_family?)
    }

    pub fn who_won_faceoff(&self) -> Option<ClientId> {
        self.faceoffer(self.faceoff_winning_family?)
    }

    // -- Turn order --

    /// Family and roster position of whoever may answer next.
    ///
    /// - Face-off: the buzzer first, then the other face-off player.
    /// - Steal: the first member of the family that is not playing.
    /// - Play: the playing family's turn cursor, wrapping around its roster.
    pub fn answerer_position(&self) -> Option<(Family, usize)> {
        match self.round_stage {
            RoundStage::Faceoff => {
                let buzzer = self.buzzing_family?;
                let family = match self.faceoff_attempts {
                    0 => buzzer,
                    1 => buzzer.other(),
                    _ => return None,
                };
                let id = self.faceoffer(family)?;
                let position = self.family_members(family).position(|p| p.id == id)?;
                Some((family, position))
            }
            RoundStage::Steal => {
                let family = self.playing_family?.other();
                (self.family_size(family) > 0).then_some((family, 0))
            }
            RoundStage::Play => {
                let family = self.playing_family?;
                let size = self.family_size(family);
                (size > 0).then(|| (family, self.current_players[family.index()] % size))
            }
            RoundStage::Start | RoundStage::End => None,
        }
    }

    /// The only client whose answer is accepted right now.
    pub fn who_can_answer(&self) -> Option<ClientId> {
        let (family, position) = self.answerer_position()?;
        self.family_member_at(family, position)
    }

    // -- Board --

    /// Index of the unrevealed answer matching `last_answer`, or `None` for
    /// a miss. Comparison uses [`normalize_answer`] on both sides; an empty
    /// answer never matches.
    pub fn check_answer(&self) -> Option<usize> {
        let given = normalize_answer(&self.last_answer);
        if given.is_empty() {
            return None;
        }
        self.answers
            .iter()
            .position(|a| !a.revealed && normalize_answer(&a.text) == given)
    }

    /// True once every answer worth points has been revealed.
    pub fn are_all_answers_flipped(&self) -> bool {
        self.answers
            .iter()
            .filter(|a| a.score > 0)
            .all(|a| a.revealed)
    }

    /// Family 0's score and family 1's score.
    pub fn score_pair(&self) -> (u32, u32) {
        (self.scores[0], self.scores[1])
    }

    /// The family with the higher score, `None` on a tie.
    pub fn leader(&self) -> Option<Family> {
        match self.scores[0].cmp(&self.scores[1]) {
            std::cmp::Ordering::Greater => Some(Family::Zero),
            std::cmp::Ordering::Less => Some(Family::One),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Longest answer text kept, in bytes.
pub const MAX_ANSWER_LEN: usize = 128;

/// Trims `s` and cuts it to at most [`MAX_ANSWER_LEN`] bytes on a char
/// boundary.
pub fn clip_answer(s: &str) -> &str {
    let s = s.trim();
    let mut end = s.len().min(MAX_ANSWER_LEN);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Lower-cases, strips punctuation, and collapses whitespace.
pub fn normalize_answer(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u32, family: Family) -> Player {
        Player {
            id: ClientId(id),
            name: format!("p{id}"),
            family,
            ready: false,
        }
    }

    /// Families alternate: 1,3,5 in family 0 and 2,4 in family 1.
    fn game_with_players() -> GameState {
        GameState {
            players: vec![
                player(1, Family::Zero),
                player(2, Family::One),
                player(3, Family::Zero),
                player(4, Family::One),
                player(5, Family::Zero),
            ],
            answers: vec![Answer::new("dog", 40), Answer::new("cat", 30), Answer::new("fish", 0)],
            ..GameState::default()
        }
    }

    #[test]
    fn test_default_round_is_not_started() {
        let game = GameState::default();
        assert_eq!(game.round, -1);
        assert_eq!(game.round_stage, RoundStage::Start);
        assert_eq!(game.who_can_answer(), None);
    }

    #[test]
    fn test_faceoff_players_rotate_by_round() {
        let mut game = game_with_players();
        game.round = 0;
        assert_eq!(game.faceoff_players(), Some((ClientId(1), ClientId(2))));
        game.round = 1;
        assert_eq!(game.faceoff_players(), Some((ClientId(3), ClientId(4))));
        game.round = 2;
        assert_eq!(game.faceoff_players(), Some((ClientId(5), ClientId(2))));
    }

    #[test]
    fn test_faceoff_players_none_when_family_empty() {
        let game = GameState {
            players: vec![player(1, Family::Zero)],
            ..GameState::default()
        };
        assert_eq!(game.faceoff_players(), None);
    }

    #[test]
    fn test_who_can_answer_in_faceoff_follows_attempts() {
        let mut game = game_with_players();
        game.round = 0;
        game.round_stage = RoundStage::Faceoff;
        game.faceoff_pair = game.faceoff_players();
        assert_eq!(game.who_can_answer(), None);

        game.buzzing_family = Some(Family::One);
        assert_eq!(game.who_can_answer(), Some(ClientId(2)));
        game.faceoff_attempts = 1;
        assert_eq!(game.who_can_answer(), Some(ClientId(1)));
        game.faceoff_attempts = 2;
        assert_eq!(game.who_can_answer(), None);
    }

    #[test]
    fn test_faceoffer_stays_fixed_when_roster_shifts() {
        let mut game = game_with_players();
        game.round = 1;
        game.round_stage = RoundStage::Faceoff;
        game.faceoff_pair = game.faceoff_players();
        game.buzzing_family = Some(Family::Zero);
        assert_eq!(game.who_can_answer(), Some(ClientId(3)));

        game.players.retain(|p| p.id != ClientId(1));

        // a fresh pairing would now pick player 5
        assert_eq!(game.faceoff_player(Family::Zero), Some(ClientId(5)));
        assert_eq!(game.who_buzzed(), Some(ClientId(3)));
        assert_eq!(game.who_can_answer(), Some(ClientId(3)));
        assert_eq!(game.answerer_position(), Some((Family::Zero, 0)));
    }

    #[test]
    fn test_departed_faceoffer_cannot_answer() {
        let mut game = game_with_players();
        game.round = 0;
        game.round_stage = RoundStage::Faceoff;
        game.faceoff_pair = game.faceoff_players();
        game.buzzing_family = Some(Family::One);

        game.players.retain(|p| p.id != ClientId(2));

        assert_eq!(game.faceoffer(Family::One), None);
        assert_eq!(game.faceoff_family_of(ClientId(4)), None);
        assert_eq!(game.who_can_answer(), None);
    }

    #[test]
    fn test_who_can_answer_in_steal_is_head_of_other_family() {
        let mut game = game_with_players();
        game.round_stage = RoundStage::Steal;
        game.playing_family = Some(Family::Zero);
        assert_eq!(game.who_can_answer(), Some(ClientId(2)));
    }

    #[test]
    fn test_who_can_answer_in_play_cycles_roster() {
        let mut game = game_with_players();
        game.round_stage = RoundStage::Play;
        game.playing_family = Some(Family::One);
        assert_eq!(game.who_can_answer(), Some(ClientId(2)));
        game.current_players[1] = 1;
        assert_eq!(game.who_can_answer(), Some(ClientId(4)));
        game.current_players[1] = 2;
        assert_eq!(game.who_can_answer(), Some(ClientId(2)));
        assert_eq!(game.answerer_position(), Some((Family::One, 0)));
    }

    #[test]
    fn test_check_answer_normalizes() {
        let mut game = game_with_players();
        game.last_answer = "  DOG!! ".into();
        assert_eq!(game.check_answer(), Some(0));
        game.last_answer = "Cat".into();
        assert_eq!(game.check_answer(), Some(1));
        game.last_answer = "horse".into();
        assert_eq!(game.check_answer(), None);
    }

    #[test]
    fn test_check_answer_skips_revealed_and_empty() {
        let mut game = game_with_players();
        game.answers[0].revealed = true;
        game.last_answer = "dog".into();
        assert_eq!(game.check_answer(), None);
        game.last_answer = "...".into();
        assert_eq!(game.check_answer(), None);
    }

    #[test]
    fn test_all_answers_flipped_ignores_zero_score() {
        let mut game = game_with_players();
        assert!(!game.are_all_answers_flipped());
        game.answers[0].revealed = true;
        game.answers[1].revealed = true;
        assert!(game.are_all_answers_flipped());
    }

    #[test]
    fn test_leader() {
        let mut game = GameState::default();
        assert_eq!(game.leader(), None);
        game.scores = [10, 30];
        assert_eq!(game.leader(), Some(Family::One));
        game.scores = [31, 30];
        assert_eq!(game.leader(), Some(Family::Zero));
    }

    #[test]
    fn test_clip_answer_caps_length_on_char_boundary() {
        assert_eq!(clip_answer("  dog "), "dog");
        let long = "a".repeat(200);
        assert_eq!(clip_answer(&long).len(), MAX_ANSWER_LEN);
        // 'é' is two bytes; 127 of 'a' then 'é' would end at 129
        let mixed = format!("{}é", "a".repeat(127));
        assert_eq!(clip_answer(&mixed), "a".repeat(127));
    }

    #[test]
    fn test_normalize_answer() {
        assert_eq!(normalize_answer("  The   Dog's  Bowl. "), "the dogs bowl");
        assert_eq!(normalize_answer("..."), "");
    }
}
