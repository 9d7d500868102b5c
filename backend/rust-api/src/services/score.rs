//! Score computation. The same routine runs twice per attempt: once in the
//! session engine for the provisional score and once in the submission
//! gateway for the authoritative one. Given the same inputs the two must
//! agree exactly.

use crate::models::answer::Answer;
use crate::models::question::Question;
use crate::models::session::ScoreAnchor;

/// Percentage score in `[0, 100]`. Answers join to questions by id, never by
/// position; the raw percentage is scaled by the difficulty multiplier and
/// capped at 100. An empty question list scores 0 rather than dividing by
/// zero, and a fully-unanswered attempt scores 0 rather than nothing.
pub fn compute_score(questions: &[Question], answers: &[Answer], multiplier: f64) -> u32 {
    let answered = answers
        .iter()
        .filter(|a| a.selected_option_index.is_some())
        .count();
    if answered == 0 {
        return 0;
    }

    let denominator = questions.len().max(1) as f64;
    let correct = count_correct(questions, answers) as f64;
    let raw = correct / denominator * 100.0;
    let scaled = (raw * multiplier.max(0.0)).round();
    scaled.min(100.0) as u32
}

/// Direct answer-comparison count, joined by question id.
pub fn count_correct(questions: &[Question], answers: &[Answer]) -> u32 {
    answers
        .iter()
        .filter(|a| {
            a.selected_option_index.is_some_and(|selected| {
                questions
                    .iter()
                    .find(|q| q.id == a.question_id)
                    .is_some_and(|q| q.correct_index == selected)
            })
        })
        .count() as u32
}

/// Back-projects a correct-answer count from a final score. Because the
/// score is multiplier-scaled and capped, the direct count can underestimate
/// what the backend graded; the result is clamped to the question count.
pub fn derive_correct_count(score: u32, multiplier: f64, total: usize) -> u32 {
    if total == 0 || multiplier <= 0.0 {
        return 0;
    }
    let fraction = (score as f64 / multiplier) / 100.0;
    let derived = (fraction * total as f64).round();
    (derived.max(0.0) as u32).min(total as u32)
}

/// Finalizes the `(score, correct_count)` pair displayed on completion.
/// The score comes from the anchor; if the anchor is somehow empty it is
/// recomputed from the raw counts so the result screen never shows a
/// missing value. The displayed correct count is the direct comparison
/// count, reconciled upward against the count implied by an authoritative
/// score.
pub fn finalize(
    questions: &[Question],
    answers: &[Answer],
    multiplier: f64,
    anchor: &ScoreAnchor,
) -> (u32, u32) {
    let score = anchor
        .value()
        .unwrap_or_else(|| compute_score(questions, answers, multiplier));

    let direct = count_correct(questions, answers);
    let correct = if anchor.is_authoritative() {
        direct.max(derive_correct_count(score, multiplier, questions.len()))
    } else {
        direct
    };

    (score, correct)
}
