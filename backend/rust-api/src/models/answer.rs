use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::question::Question;
use super::Difficulty;

/// One answer slot per loaded question. Slots are created when a
/// difficulty's questions are loaded and become read-only once submission
/// begins. `question_id` is the join key; positional matching is never used
/// because question sets can be reordered or repaired between loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub selected_option_index: Option<u32>,
}

/// Fresh, unanswered slot per question.
pub fn derive_answers(questions: &[Question]) -> Vec<Answer> {
    questions
        .iter()
        .map(|q| Answer {
            question_id: q.id.clone(),
            selected_option_index: None,
        })
        .collect()
}

/// True when the answer list no longer covers the question list (length or
/// identity-set mismatch) and must be repaired before scoring.
pub fn answers_drifted(questions: &[Question], answers: &[Answer]) -> bool {
    answers.len() != questions.len()
        || questions
            .iter()
            .any(|q| !answers.iter().any(|a| a.question_id == q.id))
}

/// Rebuilds the answer list from the current question list, preserving any
/// existing selection whose `question_id` still matches. Used whenever the
/// two lists have drifted (partial reload, repaired question set).
pub fn repair_answers(questions: &[Question], existing: &[Answer]) -> Vec<Answer> {
    questions
        .iter()
        .map(|q| Answer {
            question_id: q.id.clone(),
            selected_option_index: existing
                .iter()
                .find(|a| a.question_id == q.id)
                .and_then(|a| a.selected_option_index),
        })
        .collect()
}

/// Immutable outcome of one completed attempt. `score` is `None` for
/// ungraded submissions (quizzes without auto-check), which is distinct
/// from a score of 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    #[serde(rename = "_id")]
    pub response_id: String,
    pub quiz_id: String,
    pub score: Option<u32>,
    pub selected_difficulty: Difficulty,
    pub tab_switch_count: u32,
    pub answers: Vec<Answer>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

/// Payload handed to the submission gateway.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub quiz_id: String,
    pub answers: Vec<Answer>,
    pub started_at: DateTime<Utc>,
    pub tab_switch_count: u32,
    pub difficulty: Difficulty,
}

/// Successful gateway response. `response_id` is always present; `score`
/// is `None` when the attempt is recorded but not graded.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub response_id: String,
    pub score: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionOption;

    fn question(id: &str) -> Question {
        Question {
            id: id.into(),
            text: format!("question {}", id),
            options: vec![QuestionOption {
                id: format!("{}-0", id),
                text: "a".into(),
                is_correct: true,
            }],
            correct_index: 0,
        }
    }

    #[test]
    fn repair_preserves_matches_and_fills_gaps() {
        let questions = vec![question("a"), question("b"), question("c")];
        // Simulates a partial reload: one slot missing, one stale.
        let existing = vec![
            Answer {
                question_id: "b".into(),
                selected_option_index: Some(2),
            },
            Answer {
                question_id: "gone".into(),
                selected_option_index: Some(1),
            },
        ];

        let repaired = repair_answers(&questions, &existing);
        assert_eq!(repaired.len(), questions.len());
        assert_eq!(repaired[0].selected_option_index, None);
        assert_eq!(repaired[1].selected_option_index, Some(2));
        assert_eq!(repaired[2].selected_option_index, None);
    }

    #[test]
    fn repair_survives_reordering() {
        let questions = vec![question("b"), question("a")];
        let existing = vec![
            Answer {
                question_id: "a".into(),
                selected_option_index: Some(0),
            },
            Answer {
                question_id: "b".into(),
                selected_option_index: Some(1),
            },
        ];

        let repaired = repair_answers(&questions, &existing);
        assert_eq!(repaired[0].question_id, "b");
        assert_eq!(repaired[0].selected_option_index, Some(1));
        assert_eq!(repaired[1].selected_option_index, Some(0));
    }
}
