use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::SessionError;
use crate::metrics::{ANSWERS_RECORDED_TOTAL, SESSIONS_ACTIVE, SESSIONS_TOTAL, SUBMISSIONS_TOTAL};
use crate::models::answer::{answers_drifted, derive_answers, repair_answers, SubmissionRequest};
use crate::models::session::{
    FinalResult, QuizSession, SessionPhase, SessionView, TabSwitchResponse,
};
use crate::models::timer::TickOutcome;
use crate::models::Difficulty;
use crate::services::question_bank::QuestionBank;
use crate::services::recovery_store::RecoveryStore;
use crate::services::score;
use crate::services::submission_gateway::SubmissionGateway;

/// Read-only view of a session's clock for the SSE stream.
#[derive(Debug, Clone, Copy)]
pub struct TimerSnapshot {
    pub phase: SessionPhase,
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub expired: bool,
}

/// The quiz-taking session engine. Owns all mutable session state in an
/// in-memory registry; every HTTP handler and the per-session timer task go
/// through here. Locks are never held across an await of the question bank,
/// the gateway, or the recovery store.
#[derive(Clone)]
pub struct SessionService {
    sessions: Arc<RwLock<HashMap<String, QuizSession>>>,
    question_bank: Arc<dyn QuestionBank>,
    gateway: Arc<dyn SubmissionGateway>,
    recovery: Arc<dyn RecoveryStore>,
}

impl SessionService {
    pub fn new(
        question_bank: Arc<dyn QuestionBank>,
        gateway: Arc<dyn SubmissionGateway>,
        recovery: Arc<dyn RecoveryStore>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            question_bank,
            gateway,
            recovery,
        }
    }

    pub async fn create_session(&self, quiz_id: &str) -> Result<SessionView, SessionError> {
        let quiz = self
            .question_bank
            .fetch_quiz(quiz_id)
            .await?
            .ok_or_else(|| SessionError::QuizNotFound(quiz_id.to_string()))?;

        let session = QuizSession::new(Uuid::new_v4().to_string(), quiz);
        let view = session.view();

        tracing::info!(
            "Session {} created for quiz {} (default difficulty {})",
            session.id,
            quiz_id,
            session.selected_difficulty
        );
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);

        SESSIONS_TOTAL.with_label_values(&["created"]).inc();
        SESSIONS_ACTIVE.inc();

        Ok(view)
    }

    pub async fn get_view(&self, session_id: &str) -> Result<SessionView, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.view())
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Changes the active difficulty before the quiz has started, reloading
    /// questions and reseeding the timer. A second request for a difficulty
    /// whose load is already in flight is a no-op.
    pub async fn select_difficulty(
        &self,
        session_id: &str,
        difficulty: Difficulty,
    ) -> Result<SessionView, SessionError> {
        let (quiz_id, epoch) = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

            match session.phase {
                SessionPhase::DifficultySelecting | SessionPhase::QuestionsLoading => {}
                phase => {
                    return Err(SessionError::InvalidPhase {
                        action: "change difficulty",
                        phase,
                    })
                }
            }
            if !session.quiz.available_difficulties.is_empty()
                && !session.quiz.available_difficulties.contains(&difficulty)
            {
                return Err(SessionError::DifficultyUnavailable { difficulty });
            }
            if session.loading_difficulty == Some(difficulty) {
                return Ok(session.view());
            }

            session.selected_difficulty = difficulty;
            session.questions.clear();
            session.questions_loaded = false;
            session.answers.clear();
            session.timer.reset(session.resolved_duration_minutes());
            session.loading_difficulty = Some(difficulty);
            session.phase = SessionPhase::QuestionsLoading;
            session.epoch += 1;
            (session.quiz.id.clone(), session.epoch)
        };

        self.run_question_load(session_id, &quiz_id, difficulty, epoch)
            .await
    }

    /// Completes an in-flight question load, applying the result only if no
    /// newer difficulty change or teardown superseded it.
    async fn run_question_load(
        &self,
        session_id: &str,
        quiz_id: &str,
        difficulty: Difficulty,
        epoch: u64,
    ) -> Result<SessionView, SessionError> {
        let loaded = self.question_bank.load_questions(quiz_id, difficulty).await;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

        if session.epoch != epoch {
            tracing::debug!(
                "Dropping stale {} question load for session {}",
                difficulty,
                session_id
            );
            return Ok(session.view());
        }

        session.loading_difficulty = None;
        session.phase = SessionPhase::DifficultySelecting;
        match loaded {
            Ok(questions) => {
                tracing::info!(
                    "Questions loaded for session {}: {} at {} difficulty",
                    session_id,
                    questions.len(),
                    difficulty
                );
                session.questions = questions;
                session.questions_loaded = true;
                Ok(session.view())
            }
            Err(e) => Err(SessionError::Internal(e)),
        }
    }

    /// Enters `InProgress`: requires a non-empty question list (auto-loading
    /// it if the selection has not been loaded yet), derives fresh answer
    /// slots, and starts the timer at the difficulty's resolved duration.
    pub async fn start(&self, session_id: &str) -> Result<SessionView, SessionError> {
        let pending = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

            match session.phase {
                SessionPhase::DifficultySelecting => {}
                phase => return Err(SessionError::InvalidPhase { action: "start", phase }),
            }

            if session.questions_loaded {
                None
            } else {
                session.loading_difficulty = Some(session.selected_difficulty);
                session.phase = SessionPhase::QuestionsLoading;
                session.epoch += 1;
                Some((
                    session.quiz.id.clone(),
                    session.selected_difficulty,
                    session.epoch,
                ))
            }
        };

        if let Some((quiz_id, difficulty, epoch)) = pending {
            self.run_question_load(session_id, &quiz_id, difficulty, epoch)
                .await?;
        }

        let epoch = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

            if session.phase != SessionPhase::DifficultySelecting {
                return Err(SessionError::InvalidPhase {
                    action: "start",
                    phase: session.phase,
                });
            }
            if session.questions.is_empty() {
                return Err(SessionError::DataUnavailable {
                    difficulty: session.selected_difficulty,
                });
            }

            session.answers = derive_answers(&session.questions);
            session.current_question_index = 0;
            session.started_at = Some(Utc::now());
            session.timer.start(session.resolved_duration_minutes());
            session.phase = SessionPhase::InProgress;
            session.epoch += 1;

            tracing::info!(
                "Session {} started: {} questions, {} difficulty, {}s on the clock",
                session_id,
                session.questions.len(),
                session.selected_difficulty,
                session.timer.remaining_seconds
            );
            session.epoch
        };

        self.spawn_timer(session_id.to_string(), epoch);
        self.get_view(session_id).await
    }

    /// Per-session tick source. Stops as soon as the session disappears, is
    /// superseded (epoch bump), or completes; expiry triggers an automatic
    /// submission of whatever has been answered.
    fn spawn_timer(&self, session_id: String, epoch: u64) {
        let service = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;

                let expired = {
                    let mut sessions = service.sessions.write().await;
                    let Some(session) = sessions.get_mut(&session_id) else {
                        break;
                    };
                    if session.epoch != epoch || session.phase == SessionPhase::Completed {
                        break;
                    }
                    matches!(session.timer.tick(), TickOutcome::Expired)
                };

                if expired {
                    tracing::info!("Time up for session {}, auto-submitting", session_id);
                    if let Err(e) = service.submit(&session_id).await {
                        tracing::warn!(
                            "Auto-submit after expiry failed for session {}: {}",
                            session_id,
                            e
                        );
                    }
                    break;
                }
            }
        });
    }

    pub async fn record_answer(
        &self,
        session_id: &str,
        question_id: &str,
        selected_option_index: Option<u32>,
    ) -> Result<SessionView, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

        if session.phase != SessionPhase::InProgress {
            return Err(SessionError::InvalidPhase {
                action: "answer",
                phase: session.phase,
            });
        }

        let position = session
            .questions
            .iter()
            .position(|q| q.id == question_id)
            .ok_or_else(|| SessionError::QuestionNotFound(question_id.to_string()))?;

        if let Some(index) = selected_option_index {
            if index as usize >= session.questions[position].options.len() {
                return Err(SessionError::InvalidOption {
                    question_id: question_id.to_string(),
                    index,
                });
            }
        }

        if answers_drifted(&session.questions, &session.answers) {
            tracing::debug!("Repairing drifted answer slots for session {}", session_id);
            session.answers = repair_answers(&session.questions, &session.answers);
        }
        if let Some(slot) = session
            .answers
            .iter_mut()
            .find(|a| a.question_id == question_id)
        {
            slot.selected_option_index = selected_option_index;
        }
        session.current_question_index = position;

        ANSWERS_RECORDED_TOTAL
            .with_label_values(&[session.selected_difficulty.as_str()])
            .inc();

        Ok(session.view())
    }

    /// Advisory telemetry only; never fails or ends the session.
    pub async fn tab_switch(&self, session_id: &str) -> Result<TabSwitchResponse, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

        if session.phase == SessionPhase::InProgress {
            session.tab_switch_count += 1;
            tracing::debug!(
                "Tab switch on session {} (count {})",
                session_id,
                session.tab_switch_count
            );
        }
        Ok(TabSwitchResponse {
            tab_switch_count: session.tab_switch_count,
        })
    }

    /// The submission pipeline: anchor a provisional score, call the
    /// gateway, reconcile, and complete. A gateway failure degrades to the
    /// recovery store and a locally generated response id; it never fails
    /// the user-visible flow.
    pub async fn submit(&self, session_id: &str) -> Result<FinalResult, SessionError> {
        // Pre-check, plus last-ditch restores from the recovery store: the
        // question list before refusing an unanswerable submit, the score
        // when a completed session has lost both its result and its anchor.
        let (restore_questions, restore_score) = {
            let sessions = self.sessions.read().await;
            let session = sessions
                .get(session_id)
                .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

            match session.phase {
                SessionPhase::Completed => {
                    if let Some(result) = session.result_view() {
                        return Ok(result);
                    }
                    (None, Some(session.quiz.id.clone()))
                }
                SessionPhase::InProgress => {
                    if session.questions.is_empty() {
                        (Some(session.quiz.id.clone()), None)
                    } else {
                        (None, None)
                    }
                }
                phase => {
                    return Err(SessionError::InvalidPhase {
                        action: "submit",
                        phase,
                    })
                }
            }
        };

        if let Some(quiz_id) = restore_score {
            match self.recovery.load_score(&quiz_id).await {
                Ok(Some(score)) => {
                    tracing::warn!(
                        "Restored score {} for session {} from the recovery store",
                        score,
                        session_id
                    );
                    let mut sessions = self.sessions.write().await;
                    let session = sessions
                        .get_mut(session_id)
                        .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
                    session.anchor.record_provisional(score);
                    return session.result_view().ok_or_else(|| {
                        SessionError::CannotSubmit("the session has already ended".into())
                    });
                }
                Ok(None) => {
                    return Err(SessionError::CannotSubmit(
                        "the session has already ended".into(),
                    ));
                }
                Err(e) => {
                    tracing::warn!("Recovery store read failed for quiz {}: {:#}", quiz_id, e);
                    return Err(SessionError::CannotSubmit(
                        "the session has already ended".into(),
                    ));
                }
            }
        }

        if let Some(quiz_id) = restore_questions {
            match self.recovery.load_questions(&quiz_id).await {
                Ok(Some(questions)) if !questions.is_empty() => {
                    let mut sessions = self.sessions.write().await;
                    if let Some(session) = sessions.get_mut(session_id) {
                        if session.phase == SessionPhase::InProgress
                            && session.questions.is_empty()
                        {
                            tracing::warn!(
                                "Restored {} questions for session {} from the recovery store",
                                questions.len(),
                                session_id
                            );
                            session.questions = questions;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    "Recovery store read failed for quiz {}: {:#}",
                    quiz_id,
                    e
                ),
            }
        }

        // Freeze the attempt: repair drift, anchor the provisional score,
        // pause the clock so it cannot expire mid-submit.
        let (request, questions, provisional, epoch) = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

            if session.phase != SessionPhase::InProgress {
                return Err(SessionError::InvalidPhase {
                    action: "submit",
                    phase: session.phase,
                });
            }
            if session.questions.is_empty() {
                return Err(SessionError::CannotSubmit(
                    "this quiz has no questions".into(),
                ));
            }
            let started_at = session.started_at.ok_or_else(|| {
                SessionError::CannotSubmit("the session has no start time".into())
            })?;

            if answers_drifted(&session.questions, &session.answers) {
                tracing::warn!(
                    "Answer drift detected on session {}, rebuilding from current questions",
                    session_id
                );
                session.answers = repair_answers(&session.questions, &session.answers);
            }

            let provisional = score::compute_score(
                &session.questions,
                &session.answers,
                session.resolved_multiplier(),
            );
            session.anchor.record_provisional(provisional);
            session.timer.pause();
            session.phase = SessionPhase::Submitting;

            let request = SubmissionRequest {
                quiz_id: session.quiz.id.clone(),
                answers: session.answers.clone(),
                started_at,
                tab_switch_count: session.tab_switch_count,
                difficulty: session.selected_difficulty,
            };
            (request, session.questions.clone(), provisional, session.epoch)
        };

        tracing::info!(
            "Submitting session {}: provisional score {}",
            session_id,
            provisional
        );
        let outcome = self.gateway.submit(&request).await;

        let gateway_outcome = match outcome {
            Ok(Some(outcome)) => Some(outcome),
            Ok(None) => {
                tracing::error!("Submission gateway returned no outcome for session {}", session_id);
                None
            }
            Err(e) => {
                tracing::error!("Submission gateway failed for session {}: {:#}", session_id, e);
                None
            }
        };

        // Backup writes are best effort; on the gateway-failure path they are
        // the only persistence this attempt gets.
        let backup_score = gateway_outcome
            .as_ref()
            .and_then(|o| o.score)
            .unwrap_or(provisional);
        if let Err(e) = self.recovery.save_score(&request.quiz_id, backup_score).await {
            tracing::warn!("Score backup failed for quiz {}: {:#}", request.quiz_id, e);
        }
        if let Err(e) = self
            .recovery
            .save_questions(&request.quiz_id, &questions)
            .await
        {
            tracing::warn!(
                "Question backup failed for quiz {}: {:#}",
                request.quiz_id,
                e
            );
        }

        // Reconcile and complete. If the session was torn down or reset
        // while the gateway call was in flight, no state is written.
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        if session.epoch != epoch {
            return Err(SessionError::CannotSubmit(
                "the session was reset while submitting".into(),
            ));
        }

        let (response_id, locally_persisted) = match gateway_outcome {
            Some(outcome) => {
                if let Some(authoritative) = outcome.score {
                    if authoritative.abs_diff(provisional) > 1 {
                        tracing::warn!(
                            "Score drift on session {}: provisional {} vs authoritative {}",
                            session_id,
                            provisional,
                            authoritative
                        );
                    }
                    session.anchor.record_authoritative(authoritative);
                }
                SUBMISSIONS_TOTAL.with_label_values(&["authoritative"]).inc();
                (outcome.response_id, false)
            }
            None => {
                SUBMISSIONS_TOTAL.with_label_values(&["local_fallback"]).inc();
                (format!("local-{}", Uuid::new_v4()), true)
            }
        };

        let (final_score, correct_count) = score::finalize(
            &session.questions,
            &session.answers,
            session.resolved_multiplier(),
            &session.anchor,
        );
        let result = FinalResult {
            response_id,
            score: final_score,
            correct_count,
            total_count: session.questions.len() as u32,
            selected_difficulty: session.selected_difficulty,
            locally_persisted,
        };
        session.result = Some(result.clone());
        session.phase = SessionPhase::Completed;

        SESSIONS_TOTAL.with_label_values(&["completed"]).inc();
        SESSIONS_ACTIVE.dec();
        tracing::info!(
            "Session {} completed: score {} ({}/{} correct, response {})",
            session_id,
            result.score,
            result.correct_count,
            result.total_count,
            result.response_id
        );

        Ok(result)
    }

    /// Fresh attempt on the same quiz: answers, telemetry, and clock reset;
    /// the previous score seeds the new anchor for recovery continuity.
    pub async fn retry(&self, session_id: &str) -> Result<SessionView, SessionError> {
        let epoch = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

            if session.phase != SessionPhase::Completed {
                return Err(SessionError::InvalidPhase {
                    action: "retry",
                    phase: session.phase,
                });
            }
            if session.questions.is_empty() {
                return Err(SessionError::DataUnavailable {
                    difficulty: session.selected_difficulty,
                });
            }

            session.reset_for_retry();
            tracing::info!(
                "Session {} retrying at {} difficulty",
                session_id,
                session.selected_difficulty
            );
            session.epoch
        };

        SESSIONS_TOTAL.with_label_values(&["retried"]).inc();
        SESSIONS_ACTIVE.inc();
        self.spawn_timer(session_id.to_string(), epoch);
        self.get_view(session_id).await
    }

    /// Discards the session. The timer task observes the removal on its next
    /// tick and stops; in-flight loads and submissions find no session to
    /// write back to.
    pub async fn teardown(&self, session_id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(session_id) {
            Some(session) => {
                if session.phase != SessionPhase::Completed {
                    SESSIONS_TOTAL.with_label_values(&["abandoned"]).inc();
                    SESSIONS_ACTIVE.dec();
                }
                tracing::info!("Session {} discarded", session_id);
                Ok(())
            }
            None => Err(SessionError::SessionNotFound(session_id.to_string())),
        }
    }

    pub async fn timer_snapshot(&self, session_id: &str) -> Option<TimerSnapshot> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| TimerSnapshot {
                phase: s.phase,
                remaining_seconds: s.timer.remaining_seconds,
                total_seconds: s.timer.total_seconds,
                expired: s.timer.expired(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Question, QuestionOption};
    use crate::models::{DifficultySetting, Quiz};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn quiz(is_auto_check: bool) -> Quiz {
        let mut quiz = Quiz {
            id: "quiz-1".into(),
            title: "Basics".into(),
            description: None,
            duration_minutes: 10,
            is_auto_check,
            available_difficulties: vec![Difficulty::Easy, Difficulty::Medium, Difficulty::Hard],
            difficulty_settings: Default::default(),
        };
        quiz.difficulty_settings.insert(
            Difficulty::Hard,
            DifficultySetting {
                duration_minutes: Some(20),
                points_multiplier: Some(2.0),
            },
        );
        quiz
    }

    fn questions(count: usize) -> Vec<Question> {
        (0..count)
            .map(|i| Question {
                id: format!("q{}", i),
                text: format!("question {}", i),
                options: (0..4)
                    .map(|o| QuestionOption {
                        id: format!("q{}-{}", i, o),
                        text: format!("option {}", o),
                        is_correct: o == 1,
                    })
                    .collect(),
                correct_index: 1,
            })
            .collect()
    }

    struct StaticBank {
        quiz: Quiz,
        questions: Vec<Question>,
    }

    #[async_trait]
    impl QuestionBank for StaticBank {
        async fn fetch_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>> {
            Ok((quiz_id == self.quiz.id).then(|| self.quiz.clone()))
        }

        async fn load_questions(
            &self,
            _quiz_id: &str,
            difficulty: Difficulty,
        ) -> Result<Vec<Question>> {
            // Hard has no dedicated set in these fixtures.
            if difficulty == Difficulty::Hard {
                return Ok(Vec::new());
            }
            Ok(self.questions.clone())
        }
    }

    struct ScriptedGateway {
        fail: bool,
        score: Option<u32>,
    }

    #[async_trait]
    impl SubmissionGateway for ScriptedGateway {
        async fn submit(
            &self,
            _request: &SubmissionRequest,
        ) -> Result<Option<crate::models::answer::SubmissionOutcome>> {
            if self.fail {
                return Err(anyhow!("gateway unreachable"));
            }
            Ok(Some(crate::models::answer::SubmissionOutcome {
                response_id: "resp-1".into(),
                score: self.score,
            }))
        }
    }

    #[derive(Default)]
    struct MemoryRecovery {
        scores: Mutex<HashMap<String, u32>>,
        questions: Mutex<HashMap<String, Vec<Question>>>,
    }

    #[async_trait]
    impl RecoveryStore for MemoryRecovery {
        async fn save_score(&self, quiz_id: &str, score: u32) -> Result<()> {
            self.scores.lock().unwrap().insert(quiz_id.into(), score);
            Ok(())
        }

        async fn load_score(&self, quiz_id: &str) -> Result<Option<u32>> {
            Ok(self.scores.lock().unwrap().get(quiz_id).copied())
        }

        async fn save_questions(&self, quiz_id: &str, questions: &[Question]) -> Result<()> {
            self.questions
                .lock()
                .unwrap()
                .insert(quiz_id.into(), questions.to_vec());
            Ok(())
        }

        async fn load_questions(&self, quiz_id: &str) -> Result<Option<Vec<Question>>> {
            Ok(self.questions.lock().unwrap().get(quiz_id).cloned())
        }
    }

    fn service(gateway: ScriptedGateway) -> (SessionService, Arc<MemoryRecovery>) {
        let recovery = Arc::new(MemoryRecovery::default());
        let service = SessionService::new(
            Arc::new(StaticBank {
                quiz: quiz(true),
                questions: questions(4),
            }),
            Arc::new(gateway),
            recovery.clone(),
        );
        (service, recovery)
    }

    async fn answer_all_correct(service: &SessionService, session_id: &str) {
        let view = service.get_view(session_id).await.unwrap();
        for q in &view.questions {
            service
                .record_answer(session_id, &q.id, Some(1))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn happy_path_uses_authoritative_score() {
        let (service, _) = service(ScriptedGateway {
            fail: false,
            score: Some(75),
        });
        let view = service.create_session("quiz-1").await.unwrap();
        assert_eq!(view.phase, SessionPhase::DifficultySelecting);
        assert_eq!(view.selected_difficulty, Difficulty::Medium);

        let view = service.start(&view.id).await.unwrap();
        assert_eq!(view.phase, SessionPhase::InProgress);
        assert_eq!(view.time_remaining_seconds, 600);
        assert_eq!(view.answers.len(), 4);

        answer_all_correct(&service, &view.id).await;
        let result = service.submit(&view.id).await.unwrap();
        // Gateway score supersedes the provisional 100.
        assert_eq!(result.score, 75);
        assert_eq!(result.response_id, "resp-1");
        assert!(!result.locally_persisted);
    }

    #[tokio::test]
    async fn gateway_failure_degrades_to_local_completion() {
        let (service, recovery) = service(ScriptedGateway {
            fail: true,
            score: None,
        });
        let view = service.create_session("quiz-1").await.unwrap();
        let view = service.start(&view.id).await.unwrap();
        answer_all_correct(&service, &view.id).await;

        let result = service.submit(&view.id).await.unwrap();
        assert!(result.response_id.starts_with("local-"));
        assert!(result.locally_persisted);
        // Provisional score survives: 4/4 correct at 1.0x.
        assert_eq!(result.score, 100);
        assert_eq!(result.correct_count, 4);

        // The attempt landed in the recovery store.
        assert_eq!(recovery.load_score("quiz-1").await.unwrap(), Some(100));
        assert_eq!(
            recovery.load_questions("quiz-1").await.unwrap().unwrap().len(),
            4
        );

        let view = service.get_view(&view.id).await.unwrap();
        assert_eq!(view.phase, SessionPhase::Completed);
    }

    #[tokio::test]
    async fn ungraded_outcome_keeps_provisional_score() {
        // Gateway succeeds but returns no score (ungraded quiz).
        let (service, _) = service(ScriptedGateway {
            fail: false,
            score: None,
        });
        let view = service.create_session("quiz-1").await.unwrap();
        let view = service.start(&view.id).await.unwrap();
        answer_all_correct(&service, &view.id).await;

        let result = service.submit(&view.id).await.unwrap();
        assert_eq!(result.response_id, "resp-1");
        assert!(!result.locally_persisted);
        assert_eq!(result.score, 100);
    }

    #[tokio::test]
    async fn start_refused_when_difficulty_has_no_questions() {
        let (service, _) = service(ScriptedGateway {
            fail: false,
            score: Some(0),
        });
        let view = service.create_session("quiz-1").await.unwrap();
        service
            .select_difficulty(&view.id, Difficulty::Hard)
            .await
            .unwrap();

        let err = service.start(&view.id).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::DataUnavailable {
                difficulty: Difficulty::Hard
            }
        ));
    }

    #[tokio::test]
    async fn difficulty_change_reseeds_timer_duration() {
        let (service, _) = service(ScriptedGateway {
            fail: false,
            score: Some(0),
        });
        let view = service.create_session("quiz-1").await.unwrap();
        // Medium: base 10 minutes.
        assert_eq!(view.duration_minutes, 10);

        let view = service
            .select_difficulty(&view.id, Difficulty::Hard)
            .await
            .unwrap();
        assert_eq!(view.duration_minutes, 20);
        assert_eq!(view.time_remaining_seconds, 1200);
    }

    #[tokio::test]
    async fn submit_requires_a_started_session() {
        let (service, _) = service(ScriptedGateway {
            fail: false,
            score: Some(0),
        });
        let view = service.create_session("quiz-1").await.unwrap();
        let err = service.submit(&view.id).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidPhase { .. }));
    }

    #[tokio::test]
    async fn retry_resets_attempt_and_seeds_anchor() {
        let (service, _) = service(ScriptedGateway {
            fail: false,
            score: Some(50),
        });
        let view = service.create_session("quiz-1").await.unwrap();
        let view = service.start(&view.id).await.unwrap();
        answer_all_correct(&service, &view.id).await;
        service.tab_switch(&view.id).await.unwrap();
        service.submit(&view.id).await.unwrap();

        let retried = service.retry(&view.id).await.unwrap();
        assert_eq!(retried.phase, SessionPhase::InProgress);
        assert_eq!(retried.tab_switch_count, 0);
        assert!(retried.answers.iter().all(|a| a.selected_option_index.is_none()));
        assert_eq!(retried.time_remaining_seconds, 600);
        // Seeded anchor keeps the previous score visible until superseded.
        assert_eq!(retried.result.as_ref().map(|r| r.score), Some(50));
    }

    #[tokio::test]
    async fn answers_readonly_once_submission_begins() {
        let (service, _) = service(ScriptedGateway {
            fail: false,
            score: Some(10),
        });
        let view = service.create_session("quiz-1").await.unwrap();
        let view = service.start(&view.id).await.unwrap();
        answer_all_correct(&service, &view.id).await;
        service.submit(&view.id).await.unwrap();

        let err = service
            .record_answer(&view.id, "q0", Some(2))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidPhase { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_auto_submits_the_attempt() {
        let recovery = Arc::new(MemoryRecovery::default());
        let mut one_minute = quiz(true);
        one_minute.duration_minutes = 1;
        let service = SessionService::new(
            Arc::new(StaticBank {
                quiz: one_minute,
                questions: questions(4),
            }),
            Arc::new(ScriptedGateway {
                fail: false,
                score: Some(40),
            }),
            recovery.clone(),
        );

        let view = service.create_session("quiz-1").await.unwrap();
        let view = service.start(&view.id).await.unwrap();
        assert_eq!(view.time_remaining_seconds, 60);
        service
            .record_answer(&view.id, "q0", Some(1))
            .await
            .unwrap();

        // Let the tick task run the clock down and fire the submission.
        tokio::time::sleep(Duration::from_secs(65)).await;

        let view = service.get_view(&view.id).await.unwrap();
        assert_eq!(view.phase, SessionPhase::Completed);
        let result = view.result.unwrap();
        assert_eq!(result.response_id, "resp-1");
        assert_eq!(result.score, 40);
        assert_eq!(recovery.load_score("quiz-1").await.unwrap(), Some(40));
    }

    #[tokio::test]
    async fn completed_submit_restores_score_from_backup() {
        let (service, recovery) = service(ScriptedGateway {
            fail: false,
            score: Some(0),
        });
        recovery.save_score("quiz-1", 85).await.unwrap();

        let view = service.create_session("quiz-1").await.unwrap();
        let view = service.start(&view.id).await.unwrap();
        {
            // Completed with an empty result slot and an empty anchor.
            let mut sessions = service.sessions.write().await;
            let session = sessions.get_mut(&view.id).unwrap();
            session.phase = SessionPhase::Completed;
            assert!(session.result.is_none());
            assert!(session.anchor.value().is_none());
        }

        let result = service.submit(&view.id).await.unwrap();
        assert_eq!(result.score, 85);
        assert!(result.locally_persisted);
        assert!(result.response_id.starts_with("local-"));
    }

    #[tokio::test]
    async fn teardown_removes_the_session() {
        let (service, _) = service(ScriptedGateway {
            fail: false,
            score: Some(0),
        });
        let view = service.create_session("quiz-1").await.unwrap();
        service.teardown(&view.id).await.unwrap();
        assert!(matches!(
            service.get_view(&view.id).await,
            Err(SessionError::SessionNotFound(_))
        ));
        assert!(matches!(
            service.teardown(&view.id).await,
            Err(SessionError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn unknown_quiz_is_not_found() {
        let (service, _) = service(ScriptedGateway {
            fail: false,
            score: Some(0),
        });
        assert!(matches!(
            service.create_session("nope").await,
            Err(SessionError::QuizNotFound(_))
        ));
    }
}
