//! Difficulty resolution. Every function here is total: any input,
//! including a missing quiz, resolves to a usable default instead of an
//! error. These run on the hot path of every session view and must never
//! fail.

use crate::models::{Difficulty, Quiz};

const DEFAULT_DURATION_MINUTES: u32 = 30;
const DEFAULT_MULTIPLIER: f64 = 1.0;

/// Duration in minutes for the given difficulty: the per-difficulty setting
/// if present and positive, else the quiz base duration if positive, else 30.
pub fn resolve_duration(quiz: Option<&Quiz>, difficulty: Difficulty) -> u32 {
    let Some(quiz) = quiz else {
        return DEFAULT_DURATION_MINUTES;
    };
    if let Some(setting) = quiz.difficulty_settings.get(&difficulty) {
        if let Some(minutes) = setting.duration_minutes {
            if minutes > 0 {
                return minutes;
            }
        }
    }
    if quiz.duration_minutes > 0 {
        quiz.duration_minutes
    } else {
        DEFAULT_DURATION_MINUTES
    }
}

/// Points multiplier for the given difficulty, defaulting to 1.0. Negative
/// stored values are treated as unset.
pub fn resolve_multiplier(quiz: Option<&Quiz>, difficulty: Difficulty) -> f64 {
    quiz.and_then(|q| q.difficulty_settings.get(&difficulty))
        .and_then(|s| s.points_multiplier)
        .filter(|m| m.is_finite() && *m >= 0.0)
        .unwrap_or(DEFAULT_MULTIPLIER)
}

pub fn is_multi_difficulty(quiz: Option<&Quiz>) -> bool {
    quiz.map(|q| q.available_difficulties.len() > 1)
        .unwrap_or(false)
}

/// Preselected difficulty for a new session: medium when available, else
/// the first configured difficulty, else medium.
pub fn recommend_default(quiz: Option<&Quiz>) -> Difficulty {
    let Some(quiz) = quiz else {
        return Difficulty::Medium;
    };
    if quiz.available_difficulties.contains(&Difficulty::Medium) {
        return Difficulty::Medium;
    }
    quiz.available_difficulties
        .first()
        .copied()
        .unwrap_or(Difficulty::Medium)
}
