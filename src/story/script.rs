use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::GameError;

const BUILTIN_SCRIPT: &str = include_str!("../../puzzles/story.toml");

#[derive(Debug, Deserialize, Clone)]
pub struct StoryScript {
    pub meta: StoryMeta,
    pub obstacles: ObstacleScript,
    pub laboratory: LabScript,
    pub control: ControlScript,
    pub quiz: Vec<Question>,
    pub bonus: BonusScript,
    pub endings: Endings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoryMeta {
    pub title: String,
    pub subtitle: String,
    pub intro: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObstacleScript {
    pub title: String,
    pub jump_prompt: String,
    /// Keys to alternate on the climbing wall, e.g. `"ADADAD"`.
    pub climb_sequence: String,
    pub bridge_sequence: Vec<Direction>,
}

impl ObstacleScript {
    pub fn climb_keys(&self) -> Vec<char> {
        self.climb_sequence
            .chars()
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabScript {
    pub title: String,
    pub formula: String,
    pub hint: String,
    pub tubes: Vec<String>,
    pub documents: Vec<Document>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Document {
    pub label: String,
    pub text: String,
    #[serde(default)]
    pub starred: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControlScript {
    pub title: String,
    pub grid_size: u8,
    pub keys: Vec<Cell>,
    pub traps: Vec<Cell>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BonusScript {
    pub offer: String,
    pub prompt: String,
    /// Compared as typed, so `0174` is not `174`.
    pub answer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Endings {
    pub victory: String,
    pub defeat: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Left => "←",
            Direction::Right => "→",
        })
    }
}

/// Grid position, zero-based. In the written form the letter selects the
/// row (`A` = 0) and the number the column (one-based), so `B2` is
/// `Cell { row: 1, col: 1 }`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String")]
pub struct Cell {
    pub row: u8,
    pub col: u8,
}

impl Cell {
    pub fn new(row: u8, col: u8) -> Self {
        Cell { row, col }
    }

    pub fn within(&self, size: u8) -> bool {
        self.row < size && self.col < size
    }
}

impl FromStr for Cell {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GameError::InvalidContent(format!("bad grid cell {s:?}"));
        let mut chars = s.trim().chars();
        let letter = chars.next().filter(char::is_ascii_alphabetic).ok_or_else(invalid)?;
        let col: u8 = chars.as_str().parse().map_err(|_| invalid())?;
        if col == 0 {
            return Err(invalid());
        }
        Ok(Cell {
            row: letter.to_ascii_uppercase() as u8 - b'A',
            col: col - 1,
        })
    }
}

impl TryFrom<String> for Cell {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'A' + self.row) as char, self.col + 1)
    }
}

impl StoryScript {
    fn check(&self) -> Result<(), GameError> {
        let invalid = |what: &str| Err(GameError::InvalidContent(what.to_string()));

        let climb = self.obstacles.climb_keys();
        if climb.is_empty() || !climb.iter().all(char::is_ascii_alphabetic) {
            return invalid("climb sequence must be letters");
        }
        if self.obstacles.bridge_sequence.is_empty() {
            return invalid("bridge sequence is empty");
        }
        if self.laboratory.formula.trim().is_empty() {
            return invalid("laboratory formula is empty");
        }

        let control = &self.control;
        if control.grid_size == 0 || control.grid_size > 26 {
            return invalid("grid size must be between 1 and 26");
        }
        if control.keys.is_empty() {
            return invalid("control room has no keys");
        }
        let mut cells = control.keys.iter().chain(&control.traps);
        if !cells.all(|cell| cell.within(control.grid_size)) {
            return invalid("control room cell outside the grid");
        }
        if control.keys.iter().any(|key| control.traps.contains(key)) {
            return invalid("a control room cell is both key and trap");
        }

        if self.bonus.answer.trim().is_empty() {
            return invalid("bonus answer is empty");
        }

        if self.quiz.is_empty() {
            return invalid("quiz has no questions");
        }
        for question in &self.quiz {
            if question.options.is_empty() || question.options.len() > 26 {
                return invalid("quiz question needs between 1 and 26 options");
            }
            if question.correct >= question.options.len() {
                return invalid("quiz answer index out of range");
            }
        }
        Ok(())
    }
}

pub fn parse_script(content: &str) -> Result<StoryScript> {
    let script: StoryScript = toml::from_str(content)?;
    script.check()?;
    Ok(script)
}

pub fn load_script(path: &Path) -> Result<StoryScript> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_script(&content).with_context(|| format!("parsing {}", path.display()))
}

pub fn builtin_script() -> Result<StoryScript> {
    parse_script(BUILTIN_SCRIPT)
}
