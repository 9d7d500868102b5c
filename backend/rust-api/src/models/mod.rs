use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub mod answer;
pub mod question;
pub mod session;
pub mod timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

/// Per-difficulty overrides. Either field may be missing in stored quizzes;
/// callers go through `services::difficulty_policy` which supplies fallbacks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DifficultySetting {
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub points_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Base duration in minutes, used when no per-difficulty override exists.
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub is_auto_check: bool,
    #[serde(default)]
    pub available_difficulties: Vec<Difficulty>,
    #[serde(default)]
    pub difficulty_settings: HashMap<Difficulty, DifficultySetting>,
}

/// Quiz fields safe to hand to a quiz-taking client.
#[derive(Debug, Clone, Serialize)]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub is_auto_check: bool,
    pub available_difficulties: Vec<Difficulty>,
    pub multi_difficulty: bool,
}
