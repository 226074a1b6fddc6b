use std::collections::HashMap;
use std::fmt;

use super::rules::{validate_answers, ValidationResult};
use super::types::{Field, Room};
use crate::error::GameError;

/// Field name to the raw text the player entered or selected.
pub type Answers = HashMap<String, String>;

pub const MAX_ERRORS: u32 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttemptStatus {
    #[default]
    Idle,
    Active,
    Solved,
    Failed,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttemptStatus::Idle => "idle",
            AttemptStatus::Active => "active",
            AttemptStatus::Solved => "solved",
            AttemptStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Solved,
    Wrong {
        errors: u32,
        fields: Vec<String>,
        exhausted: bool,
    },
}

/// One room's bounded-retry validation session.
///
/// Errors counted here are local to the room; the hub turns each one into
/// a global time penalty.
#[derive(Debug, Clone)]
pub struct PuzzleAttempt {
    status: AttemptStatus,
    answers: Answers,
    errors: u32,
    max_errors: u32,
    feedback: Option<String>,
}

impl PuzzleAttempt {
    pub fn new(max_errors: u32) -> Self {
        PuzzleAttempt {
            status: AttemptStatus::Idle,
            answers: Answers::new(),
            errors: 0,
            max_errors: max_errors.max(1),
            feedback: None,
        }
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn max_errors(&self) -> u32 {
        self.max_errors
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn start(&mut self) -> Result<(), GameError> {
        match self.status {
            AttemptStatus::Idle => {
                self.status = AttemptStatus::Active;
                Ok(())
            }
            AttemptStatus::Active => Ok(()),
            closed => Err(GameError::AttemptClosed(closed)),
        }
    }

    /// Checks a full answer set against the room's key.
    ///
    /// Incomplete forms are rejected without costing an error, the same way
    /// the submit button stays disabled until every field is filled in.
    pub fn submit(&mut self, room: &Room, answers: Answers) -> Result<SubmitOutcome, GameError> {
        if self.status != AttemptStatus::Active {
            return Err(GameError::AttemptClosed(self.status));
        }
        if let Some(field) = missing_field(room, &answers) {
            return Err(GameError::MissingAnswer(field.label.clone()));
        }

        self.answers = answers;
        match validate_answers(&room.challenge.fields, &self.answers) {
            ValidationResult::Success => {
                self.status = AttemptStatus::Solved;
                self.feedback = Some(room.narrative.success.clone());
                Ok(SubmitOutcome::Solved)
            }
            ValidationResult::Mismatch(fields) => {
                self.errors += 1;
                let exhausted = self.errors >= self.max_errors;
                if exhausted {
                    self.status = AttemptStatus::Failed;
                }
                self.feedback = Some(
                    room.narrative
                        .failure
                        .replace("{errors}", &self.errors.to_string())
                        .replace("{max}", &self.max_errors.to_string())
                        .replace("{fields}", &fields.join(", ")),
                );
                Ok(SubmitOutcome::Wrong {
                    errors: self.errors,
                    fields,
                    exhausted,
                })
            }
        }
    }

    /// Headline shown once the error budget is spent.
    pub fn game_over_message(&self, room: &Room) -> String {
        room.narrative
            .game_over
            .replace("{max}", &self.max_errors.to_string())
    }

    pub fn reset(&mut self) {
        self.status = AttemptStatus::Idle;
        self.answers.clear();
        self.errors = 0;
        self.feedback = None;
    }
}

pub fn missing_field<'a>(room: &'a Room, answers: &Answers) -> Option<&'a Field> {
    room.challenge.fields.iter().find(|field| {
        answers
            .get(&field.name)
            .map_or(true, |value| value.trim().is_empty())
    })
}
