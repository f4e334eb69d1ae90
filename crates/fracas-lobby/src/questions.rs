//! Question bank: CSV parsing and dealing questions to lobbies.
//!
//! One question per line. Scored files alternate answers and scores:
//!
//! ```text
//! Name a fruit that is yellow,banana,55,lemon,28,pineapple,9
//! ```
//!
//! Unscored files list answers only, most popular first, and the scores are
//! derived from position. A field wrapped in double quotes may contain
//! commas. Blank lines and lines starting with `#` are skipped.

use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::{Answer, QuestionError};

/// Most answers a single question may carry.
pub const MAX_ANSWERS: usize = 8;

const BUILTIN: &str = include_str!("../data/questions.csv");

/// How scores are given in a question file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuestionFormat {
    /// `question,answer,score,answer,score,...`
    #[default]
    Scored,
    /// `question,answer,answer,...`
    Unscored,
}

/// One question and its answers, highest score first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub answers: Vec<Answer>,
}

impl Question {
    /// Builds a question from `(answer, score)` pairs, lower-casing answers
    /// and ordering them by descending score.
    pub fn new(text: impl Into<String>, answers: &[(&str, u32)]) -> Self {
        let mut answers: Vec<Answer> = answers
            .iter()
            .map(|(text, score)| Answer::new(text.trim().to_lowercase(), *score))
            .collect();
        answers.sort_by(|a, b| b.score.cmp(&a.score));
        Self {
            text: text.into(),
            answers,
        }
    }
}

/// A non-empty set of questions.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Result<Self, QuestionError> {
        if questions.is_empty() {
            return Err(QuestionError::Empty);
        }
        Ok(Self { questions })
    }

    /// The bank compiled into the crate.
    pub fn builtin() -> Self {
        Self::parse(BUILTIN, QuestionFormat::Scored).expect("built-in question bank must parse")
    }

    /// Reads and parses a question file.
    pub fn load(path: impl AsRef<Path>, format: QuestionFormat) -> Result<Self, QuestionError> {
        let src = std::fs::read_to_string(path.as_ref())?;
        let bank = Self::parse(&src, format)?;
        tracing::info!(
            path = %path.as_ref().display(),
            questions = bank.len(),
            "question bank loaded"
        );
        Ok(bank)
    }

    pub fn parse(src: &str, format: QuestionFormat) -> Result<Self, QuestionError> {
        let mut questions = Vec::new();

        for (i, line) in src.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let question = parse_line(line, format).map_err(|reason| QuestionError::Parse {
                line: i + 1,
                reason,
            })?;
            questions.push(question);
        }

        Self::new(questions)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Deals `n` questions in random order. Questions repeat only when the
    /// bank holds fewer than `n`.
    pub fn deal<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Question> {
        let mut order: Vec<usize> = (0..self.questions.len()).collect();
        order.shuffle(rng);
        order
            .iter()
            .cycle()
            .take(n)
            .map(|&i| self.questions[i].clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

fn parse_line(line: &str, format: QuestionFormat) -> Result<Question, String> {
    let fields = split_fields(line)?;
    let (text, rest) = fields
        .split_first()
        .ok_or_else(|| "missing question".to_string())?;
    if text.is_empty() {
        return Err("missing question".into());
    }

    let answers: Vec<(&str, u32)> = match format {
        QuestionFormat::Scored => {
            if rest.len() % 2 != 0 {
                return Err("every answer needs a score".into());
            }
            rest.chunks(2)
                .map(|pair| {
                    let score = pair[1]
                        .parse::<u32>()
                        .map_err(|_| format!("invalid score {:?}", pair[1]))?;
                    Ok((pair[0].as_str(), score))
                })
                .collect::<Result<_, String>>()?
        }
        QuestionFormat::Unscored => {
            let scores = positional_scores(rest.len());
            rest.iter().map(String::as_str).zip(scores).collect()
        }
    };

    if answers.is_empty() {
        return Err("question has no answers".into());
    }
    if answers.len() > MAX_ANSWERS {
        return Err(format!(
            "{} answers, at most {MAX_ANSWERS} allowed",
            answers.len()
        ));
    }
    if answers.iter().any(|(a, _)| a.is_empty()) {
        return Err("empty answer".into());
    }

    Ok(Question::new(text.as_str(), &answers))
}

/// Scores for `n` unscored answers: earlier answers are worth more, and the
/// unit is `100 / (n(n+1)/2)` with integer division.
fn positional_scores(n: usize) -> Vec<u32> {
    if n == 0 {
        return Vec::new();
    }
    let unit = 100 / (n * (n + 1) / 2) as u32;
    (0..n).map(|i| unit * (n - i) as u32).collect()
}

/// Splits on commas, honouring double-quoted fields. Fields are trimmed.
fn split_fields(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quote".into());
    }
    fields.push(current.trim().to_string());
    Ok(fields)
}
