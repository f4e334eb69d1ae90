//! The stage machine.
//!
//! Stages form a closed set dispatched through one `match`. Each handler
//! runs once per entry, mutates [`GameState`](crate::GameState), broadcasts
//! exactly one stage message, and then either queues the next stage with
//! `set_next_stage` or arms the waiter that will decide it.
//!
//! ```text
//! StartRound → StartFaceoff → AskQuestion → PrepForAnswer → PromptForAnswer
//!     → RespondToAnswer ─┬→ PrepForAnswer (next answerer)
//!                        ├→ PromptPassOrPlay → StartPlay → PrepForAnswer …
//!                        ├→ StartSteal → PrepForAnswer → … → EndRound
//!                        └→ EndRound → StartRound | EndGame
//! ```

use std::fmt;

use fracas_protocol::{Family, ServerMessage};

use crate::{Broadcaster, Lobby, LobbyStage, RoundStage, WaiterKind};

/// Strikes that end the playing family's turn.
pub(crate) const MAX_INCORRECTS: u32 = 3;

/// A named step of the game flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    StartRound,
    StartFaceoff,
    AskQuestion,
    PrepForAnswer,
    PromptForAnswer,
    RespondToAnswer,
    PromptPassOrPlay,
    StartPlay,
    StartSteal,
    EndRound,
    EndGame,
}

impl StageId {
    /// Whether queueing this stage waits for every client to report ready.
    /// Judging an answer and ending the game run on the next tick instead.
    pub fn requires_ready(self) -> bool {
        !matches!(self, Self::RespondToAnswer | Self::EndGame)
    }

    /// The waiter this stage arms on entry, if it waits on a client action
    /// or on the end-of-game linger.
    pub fn arms(self) -> Option<WaiterKind> {
        match self {
            Self::AskQuestion => Some(WaiterKind::Buzz),
            Self::PromptForAnswer => Some(WaiterKind::Answer),
            Self::PromptPassOrPlay => Some(WaiterKind::PassOrPlay),
            Self::EndGame => Some(WaiterKind::EndGame),
            _ => None,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

impl Lobby {
    /// Enters `stage`. The only place stage handlers are called from.
    pub(crate) fn run_stage(&mut self, stage: StageId, out: &Broadcaster<'_>) {
        tracing::debug!(game_id = %self.id(), %stage, round = self.game.round, "entering stage");
        self.stage = Some(stage);

        match stage {
            StageId::StartRound => self.stage_start_round(out),
            StageId::StartFaceoff => self.stage_start_faceoff(out),
            StageId::AskQuestion => self.stage_ask_question(out),
            StageId::PrepForAnswer => self.stage_prep_for_answer(out),
            StageId::PromptForAnswer => self.stage_prompt_for_answer(out),
            StageId::RespondToAnswer => self.stage_respond_to_answer(out),
            StageId::PromptPassOrPlay => self.stage_prompt_pass_or_play(out),
            StageId::StartPlay => self.stage_start_play(out),
            StageId::StartSteal => self.stage_start_steal(out),
            StageId::EndRound => self.stage_end_round(out),
            StageId::EndGame => self.stage_end_game(out),
        }
    }

    fn stage_start_round(&mut self, out: &Broadcaster<'_>) {
        let game = &mut self.game;
        game.round += 1;
        game.round_stage = RoundStage::Start;
        game.playing_family = None;
        game.buzzing_family = None;
        game.faceoff_winning_family = None;
        game.faceoff_pair = None;
        game.faceoff_attempts = 0;
        game.this_round_points = 0;
        game.incorrects = 0;
        game.round_winner = None;
        game.last_answer.clear();
        game.last_answer_by = None;

        let round = game.round as usize;
        match self.questions.get(round % self.questions.len().max(1)) {
            Some(q) => {
                game.question = q.text.clone();
                game.answers = q.answers.clone();
            }
            None => {
                game.question.clear();
                game.answers.clear();
            }
        }

        out.broadcast(
            &game.players,
            &ServerMessage::InGameStartRound {
                round: round as u32,
            },
        );
        self.set_next_stage(StageId::StartFaceoff);
    }

    fn stage_start_faceoff(&mut self, out: &Broadcaster<'_>) {
        self.game.round_stage = RoundStage::Faceoff;

        let Some((a, b)) = self.game.faceoff_players() else {
            tracing::warn!(game_id = %self.id(), "no face-off pair, ending game");
            self.end_early(out);
            return;
        };
        self.game.faceoff_pair = Some((a, b));
        out.broadcast(
            &self.game.players,
            &ServerMessage::InGameStartFaceoff {
                faceoffer_0_id: a,
                faceoffer_1_id: b,
            },
        );
        self.set_next_stage(StageId::AskQuestion);
    }

    fn stage_ask_question(&mut self, out: &Broadcaster<'_>) {
        out.broadcast(
            &self.game.players,
            &ServerMessage::InGameAskQuestion {
                question: self.game.question.clone(),
                num_answers: self.game.answers.len() as u32,
            },
        );
        self.arm(WaiterKind::Buzz);
    }

    fn stage_prep_for_answer(&mut self, out: &Broadcaster<'_>) {
        let Some((family, position)) = self.game.answerer_position() else {
            self.skip_to_end_round("nobody can answer");
            return;
        };
        out.broadcast(
            &self.game.players,
            &ServerMessage::InGamePrepForPromptForAnswer {
                family,
                player_position: position as u32,
            },
        );
        self.set_next_stage(StageId::PromptForAnswer);
    }

    fn stage_prompt_for_answer(&mut self, out: &Broadcaster<'_>) {
        let Some(answerer) = self.game.who_can_answer() else {
            self.skip_to_end_round("nobody can answer");
            return;
        };
        out.broadcast(
            &self.game.players,
            &ServerMessage::prompt_for_answer(answerer, self.config.answer_timeout),
        );
        self.arm(WaiterKind::Answer);
    }

    fn stage_respond_to_answer(&mut self, out: &Broadcaster<'_>) {
        let hit = self.game.check_answer();

        let score = match hit {
            Some(i) => {
                let answer = &mut self.game.answers[i];
                answer.revealed = true;
                let score = answer.score;
                let msg = ServerMessage::InGameFlipAnswer {
                    answer_index: i as u32,
                    answer: answer.text.clone(),
                    score,
                };
                self.game.this_round_points += score;
                out.broadcast(&self.game.players, &msg);
                score
            }
            None => {
                self.game.incorrects += 1;
                out.broadcast(
                    &self.game.players,
                    &ServerMessage::InGameEggghhhh {
                        n_incorrects: self.game.incorrects,
                    },
                );
                0
            }
        };

        let next = match self.game.round_stage {
            RoundStage::Faceoff => self.resolve_faceoff(hit, score),
            RoundStage::Steal => {
                let playing = self.playing_family();
                // The steal is a single answer either way.
                self.game.round_winner = Some(match hit {
                    Some(_) => playing.other(),
                    None => playing,
                });
                StageId::EndRound
            }
            RoundStage::Play => {
                let playing = self.playing_family();
                if self.game.incorrects >= MAX_INCORRECTS {
                    StageId::StartSteal
                } else {
                    self.game.current_players[playing.index()] += 1;
                    if self.game.are_all_answers_flipped() {
                        self.game.round_winner = Some(playing);
                        StageId::EndRound
                    } else {
                        StageId::PrepForAnswer
                    }
                }
            }
            RoundStage::Start | RoundStage::End => {
                unreachable!("answer judged outside face-off, play or steal")
            }
        };
        self.set_next_stage(next);
    }

    /// Decides the face-off after each of its (at most two) answers.
    fn resolve_faceoff(&mut self, hit: Option<usize>, score: u32) -> StageId {
        let game = &mut self.game;
        let buzzer = game
            .buzzing_family
            .expect("face-off answer judged before anyone buzzed");
        game.faceoff_attempts += 1;

        if game.faceoff_attempts == 1 {
            if hit == Some(0) {
                game.faceoff_winning_family = Some(buzzer);
                return StageId::PromptPassOrPlay;
            }
            return StageId::PrepForAnswer;
        }

        if game.this_round_points == 0 {
            game.round_winner = None;
            return StageId::EndRound;
        }
        // Second answer wins only if it outscored the first.
        let winner = if score * 2 > game.this_round_points {
            buzzer.other()
        } else {
            buzzer
        };
        game.faceoff_winning_family = Some(winner);
        StageId::PromptPassOrPlay
    }

    fn stage_prompt_pass_or_play(&mut self, out: &Broadcaster<'_>) {
        let Some(winner) = self.game.who_won_faceoff() else {
            tracing::warn!(game_id = %self.id(), "face-off winner gone, defaulting to play");
            self.apply_pass_or_play(true, out);
            return;
        };
        out.broadcast(
            &self.game.players,
            &ServerMessage::InGamePromptPassOrPlay { user_id: winner },
        );
        self.arm(WaiterKind::PassOrPlay);
    }

    fn stage_start_play(&mut self, out: &Broadcaster<'_>) {
        self.game.round_stage = RoundStage::Play;
        self.game.incorrects = 0;
        let family = self.playing_family();
        out.broadcast(&self.game.players, &ServerMessage::InGameStartPlay { family });
        self.set_next_stage(StageId::PrepForAnswer);
    }

    fn stage_start_steal(&mut self, out: &Broadcaster<'_>) {
        self.game.round_stage = RoundStage::Steal;
        self.game.incorrects = 0;
        let stealing = self.playing_family().other();
        out.broadcast(
            &self.game.players,
            &ServerMessage::InGameStartSteal { family: stealing },
        );
        self.set_next_stage(StageId::PrepForAnswer);
    }

    fn stage_end_round(&mut self, out: &Broadcaster<'_>) {
        let game = &mut self.game;
        game.round_stage = RoundStage::End;
        if let Some(winner) = game.round_winner {
            game.scores[winner.index()] += game.this_round_points;
        }

        let (family0_score, family1_score) = game.score_pair();
        out.broadcast(
            &game.players,
            &ServerMessage::InGameEndRound {
                round_winner: game.round_winner,
                family0_score,
                family1_score,
            },
        );

        let played = (game.round + 1) as u32;
        if played >= self.config.rounds {
            self.set_next_stage(StageId::EndGame);
        } else {
            self.set_next_stage(StageId::StartRound);
        }
    }

    fn stage_end_game(&mut self, out: &Broadcaster<'_>) {
        self.lobby_stage = LobbyStage::Ended;

        let (family0_score, family1_score) = self.game.score_pair();
        let game_winner = self.game.leader();
        out.broadcast(
            &self.game.players,
            &ServerMessage::InGameEndGame {
                game_winner,
                family0_score,
                family1_score,
            },
        );
        tracing::info!(
            game_id = %self.id(),
            ?game_winner,
            family0_score,
            family1_score,
            "game ended"
        );
        self.arm(WaiterKind::EndGame);
    }

    // -- helpers --

    fn playing_family(&self) -> Family {
        self.game
            .playing_family
            .expect("play or steal entered without a playing family")
    }

    fn skip_to_end_round(&mut self, reason: &str) {
        tracing::warn!(game_id = %self.id(), reason, "skipping to end of round");
        self.game.round_winner = None;
        self.set_next_stage(StageId::EndRound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_judging_and_end_game_skip_ready_handshake() {
        assert!(StageId::StartRound.requires_ready());
        assert!(StageId::PromptForAnswer.requires_ready());
        assert!(!StageId::RespondToAnswer.requires_ready());
        assert!(!StageId::EndGame.requires_ready());
    }

    #[test]
    fn test_arms_maps_waiting_stages() {
        assert_eq!(StageId::AskQuestion.arms(), Some(WaiterKind::Buzz));
        assert_eq!(StageId::PromptForAnswer.arms(), Some(WaiterKind::Answer));
        assert_eq!(StageId::PromptPassOrPlay.arms(), Some(WaiterKind::PassOrPlay));
        assert_eq!(StageId::EndGame.arms(), Some(WaiterKind::EndGame));
        assert_eq!(StageId::StartRound.arms(), None);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(StageId::PromptPassOrPlay.to_string(), "PromptPassOrPlay");
    }
}
