use serde::Deserialize;

use super::rules::{Rule, DEFAULT_TOLERANCE};

#[derive(Debug, Deserialize, Clone)]
pub struct Room {
    pub meta: RoomMeta,
    pub narrative: Narrative,
    #[serde(rename = "puzzle")]
    pub challenge: Challenge,
    #[serde(default)]
    pub reference: Vec<ReferenceTable>,
    #[serde(default)]
    pub notes: Vec<NoteSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoomMeta {
    pub id: String,
    pub room_number: u32,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Narrative {
    pub intro: String,
    #[serde(default)]
    pub context: Option<String>,
    pub success: String,
    /// Accepts `{errors}`, `{max}` and `{fields}`.
    pub failure: String,
    /// Accepts `{max}`.
    pub game_over: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Challenge {
    pub fields: Vec<Field>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Field {
    pub name: String,
    pub label: String,
    /// Wording used when this field is reported wrong.
    pub error_label: String,
    pub input: InputKind,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub placeholder: String,
    pub expected: String,
    #[serde(default)]
    pub tolerance: Option<f64>,
}

impl Field {
    pub fn rule(&self) -> Rule {
        match self.input {
            InputKind::Number => Rule::Numeric {
                tolerance: self.tolerance.unwrap_or(DEFAULT_TOLERANCE),
            },
            InputKind::Choice | InputKind::Text => Rule::Exact,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Choice,
    Text,
    Number,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReferenceTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<ReferenceRow>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReferenceRow {
    pub cells: Vec<String>,
    #[serde(default)]
    pub status: Option<RowStatus>,
    #[serde(default)]
    pub audit: Option<Audit>,
}

impl ReferenceRow {
    /// Explicit status wins; otherwise the audit decides. Rows with neither
    /// are plain reference data.
    pub fn status(&self) -> Option<RowStatus> {
        self.status.or_else(|| self.audit.as_ref().map(Audit::status))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Clean,
    Suspect,
    Faulty,
}

/// `quantity × unit ÷ divisor` checked against the declared figure.
#[derive(Debug, Deserialize, Clone)]
pub struct Audit {
    pub quantity: u32,
    pub unit: f64,
    #[serde(default = "default_divisor")]
    pub divisor: f64,
    pub declared: f64,
    pub major_above: f64,
}

fn default_divisor() -> f64 {
    1.0
}

impl Audit {
    pub fn expected(&self) -> f64 {
        f64::from(self.quantity) * self.unit / self.divisor
    }

    pub fn status(&self) -> RowStatus {
        let difference = (self.expected() - self.declared).abs();
        if difference < 0.01 {
            RowStatus::Clean
        } else if difference > self.major_above {
            RowStatus::Faulty
        } else {
            RowStatus::Suspect
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NoteSection {
    pub title: String,
    pub lines: Vec<String>,
}
