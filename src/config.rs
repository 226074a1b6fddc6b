//! Game settings, read from TOML.
//!
//! Every field has a default, so an empty or missing file yields the
//! original rules: +15 s per hub error, 3 errors per room, a 60 minute
//! story countdown and -60 s per story error.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::puzzle::MAX_ERRORS;

pub const CONFIG_ENV: &str = "ESCAPE_LAB_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "escape-lab.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub variant: Variant,
    /// Overrides the embedded content: `<dir>/hub/room_*.toml` and
    /// `<dir>/story.toml`.
    pub content_dir: Option<PathBuf>,
    pub hub: HubSettings,
    pub story: StorySettings,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Hub,
    Story,
}

impl FromStr for Variant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hub" => Ok(Variant::Hub),
            "story" => Ok(Variant::Story),
            other => bail!("unknown variant {other:?} (expected \"hub\" or \"story\")"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    pub penalty_seconds: u64,
    pub max_errors: u32,
    /// Seconds the success message stays up before returning to the hub.
    pub completion_delay_seconds: u32,
}

impl Default for HubSettings {
    fn default() -> Self {
        HubSettings {
            penalty_seconds: 15,
            max_errors: MAX_ERRORS,
            completion_delay_seconds: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorySettings {
    pub time_budget_seconds: u64,
    pub penalty_seconds: u64,
    /// Correct quiz answers, out of all questions, needed to reach the
    /// final decision.
    pub quiz_pass_threshold: usize,
}

impl Default for StorySettings {
    fn default() -> Self {
        StorySettings {
            time_budget_seconds: 3600,
            penalty_seconds: 60,
            quiz_pass_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `None` disables logging; stdout belongs to the terminal UI.
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            file: Some(PathBuf::from("escape-lab.log")),
            filter: "info".to_string(),
        }
    }
}

pub fn load(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let settings: Settings =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(settings)
}

/// `$ESCAPE_LAB_CONFIG`, else `escape-lab.toml` if present, else defaults.
pub fn resolve() -> Result<Settings> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return load(Path::new(&path));
    }
    let local = Path::new(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return load(local);
    }
    Ok(Settings::default())
}
