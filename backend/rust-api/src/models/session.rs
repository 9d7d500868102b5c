use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::answer::{derive_answers, Answer};
use super::question::{Question, QuestionView};
use super::timer::QuizTimer;
use super::{Difficulty, Quiz, QuizSummary};
use crate::services::difficulty_policy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    DifficultySelecting,
    QuestionsLoading,
    InProgress,
    Submitting,
    Completed,
}

/// Durable-for-the-session score slot. Writes are monotonic in authority:
/// a provisional value never overwrites an authoritative one, and nothing
/// ever clears a value that has been set. This is what keeps a score from
/// silently disappearing when a later step fails.
#[derive(Debug, Clone, Default)]
pub struct ScoreAnchor {
    value: Option<u32>,
    authoritative: bool,
}

impl ScoreAnchor {
    /// Seeds a fresh anchor from a previous attempt's score (retry path).
    /// The seed counts as provisional so the new attempt can supersede it.
    pub fn seeded(previous: Option<u32>) -> Self {
        Self {
            value: previous,
            authoritative: false,
        }
    }

    pub fn record_provisional(&mut self, score: u32) {
        if !self.authoritative {
            self.value = Some(score);
        }
    }

    pub fn record_authoritative(&mut self, score: u32) {
        self.value = Some(score);
        self.authoritative = true;
    }

    pub fn value(&self) -> Option<u32> {
        self.value
    }

    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }
}

/// Finalized outcome shown on the completion screen.
#[derive(Debug, Clone, Serialize)]
pub struct FinalResult {
    pub response_id: String,
    pub score: u32,
    pub correct_count: u32,
    pub total_count: u32,
    pub selected_difficulty: Difficulty,
    /// True when the gateway was unreachable and the attempt only exists in
    /// the local recovery store.
    pub locally_persisted: bool,
}

/// All mutable state of one quiz-taking session. Owned exclusively by the
/// session registry; handlers only ever see `SessionView` projections.
#[derive(Debug)]
pub struct QuizSession {
    pub id: String,
    pub quiz: Quiz,
    pub phase: SessionPhase,
    pub selected_difficulty: Difficulty,
    pub questions: Vec<Question>,
    pub questions_loaded: bool,
    /// Re-entrancy guard: at most one outstanding question load at a time.
    pub loading_difficulty: Option<Difficulty>,
    pub answers: Vec<Answer>,
    pub current_question_index: usize,
    pub timer: QuizTimer,
    pub tab_switch_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub anchor: ScoreAnchor,
    pub result: Option<FinalResult>,
    /// Bumped on difficulty change, retry, and teardown-adjacent resets.
    /// In-flight loads and timer tasks compare against it and drop stale
    /// writes instead of applying them.
    pub epoch: u64,
}

impl QuizSession {
    pub fn new(id: String, quiz: Quiz) -> Self {
        let selected = difficulty_policy::recommend_default(Some(&quiz));
        let mut timer = QuizTimer::stopped();
        timer.reset(difficulty_policy::resolve_duration(Some(&quiz), selected));
        Self {
            id,
            quiz,
            phase: SessionPhase::DifficultySelecting,
            selected_difficulty: selected,
            questions: Vec::new(),
            questions_loaded: false,
            loading_difficulty: None,
            answers: Vec::new(),
            current_question_index: 0,
            timer,
            tab_switch_count: 0,
            started_at: None,
            anchor: ScoreAnchor::default(),
            result: None,
            epoch: 0,
        }
    }

    pub fn resolved_duration_minutes(&self) -> u32 {
        difficulty_policy::resolve_duration(Some(&self.quiz), self.selected_difficulty)
    }

    pub fn resolved_multiplier(&self) -> f64 {
        difficulty_policy::resolve_multiplier(Some(&self.quiz), self.selected_difficulty)
    }

    /// Resets per-attempt state for a fresh run of the same quiz. Keeps the
    /// loaded questions and seeds the score anchor from the previous attempt
    /// for continuity of recovery data.
    pub fn reset_for_retry(&mut self) {
        let previous = self
            .result
            .as_ref()
            .map(|r| r.score)
            .or_else(|| self.anchor.value());
        self.anchor = ScoreAnchor::seeded(previous);
        self.answers = derive_answers(&self.questions);
        self.current_question_index = 0;
        self.tab_switch_count = 0;
        self.result = None;
        self.started_at = Some(Utc::now());
        self.timer.start(self.resolved_duration_minutes());
        self.phase = SessionPhase::InProgress;
        self.epoch += 1;
    }

    /// The displayed result. If the finalized slot is somehow empty while
    /// the anchor holds a value, a result is synthesized from the anchor:
    /// once any score has been computed for an attempt, the display never
    /// shows "no score".
    pub fn result_view(&self) -> Option<FinalResult> {
        if let Some(result) = &self.result {
            return Some(result.clone());
        }
        self.anchor.value().map(|score| FinalResult {
            response_id: format!("local-{}", self.id),
            score,
            correct_count: crate::services::score::count_correct(&self.questions, &self.answers),
            total_count: self.questions.len() as u32,
            selected_difficulty: self.selected_difficulty,
            locally_persisted: true,
        })
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id.clone(),
            quiz: QuizSummary {
                id: self.quiz.id.clone(),
                title: self.quiz.title.clone(),
                description: self.quiz.description.clone(),
                is_auto_check: self.quiz.is_auto_check,
                available_difficulties: self.quiz.available_difficulties.clone(),
                multi_difficulty: difficulty_policy::is_multi_difficulty(Some(&self.quiz)),
            },
            phase: self.phase,
            selected_difficulty: self.selected_difficulty,
            duration_minutes: self.resolved_duration_minutes(),
            questions_loaded: self.questions_loaded,
            questions: self.questions.iter().map(QuestionView::from).collect(),
            answers: self.answers.clone(),
            current_question_index: self.current_question_index,
            time_remaining_seconds: self.timer.remaining_seconds,
            tab_switch_count: self.tab_switch_count,
            result: self.result_view(),
        }
    }
}

/// Read-only projection of a session, serialized to clients. Never includes
/// answer keys.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: String,
    pub quiz: QuizSummary,
    pub phase: SessionPhase,
    pub selected_difficulty: Difficulty,
    pub duration_minutes: u32,
    pub questions_loaded: bool,
    pub questions: Vec<QuestionView>,
    pub answers: Vec<Answer>,
    pub current_question_index: usize,
    pub time_remaining_seconds: u32,
    pub tab_switch_count: u32,
    pub result: Option<FinalResult>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub quiz_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectDifficultyRequest {
    pub difficulty: Difficulty,
}

#[derive(Debug, Deserialize)]
pub struct RecordAnswerRequest {
    pub selected_option_index: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct TabSwitchResponse {
    pub tab_switch_count: u32,
}
