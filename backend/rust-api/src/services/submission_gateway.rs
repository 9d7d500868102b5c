use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use mongodb::Database;

use crate::metrics::track_db_operation;
use crate::models::answer::{ScoreRecord, SubmissionOutcome, SubmissionRequest};
use crate::services::question_bank::QuestionBank;
use crate::services::{difficulty_policy, score};
use crate::utils::retry::RetryConfig;

/// Write-side boundary that persists a finished attempt and returns the
/// authoritative score. `Ok(None)` and `Err` both signal failure; the session
/// engine treats them identically and falls back to local persistence.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<Option<SubmissionOutcome>>;
}

/// Grades against the canonical question set and stores an immutable
/// `ScoreRecord`. Uses the same score computation as the session engine's
/// provisional pass; the two are expected to agree exactly.
pub struct MongoSubmissionGateway {
    mongo: Database,
    question_bank: Arc<dyn QuestionBank>,
}

impl MongoSubmissionGateway {
    pub fn new(mongo: Database, question_bank: Arc<dyn QuestionBank>) -> Self {
        Self {
            mongo,
            question_bank,
        }
    }
}

#[async_trait]
impl SubmissionGateway for MongoSubmissionGateway {
    async fn submit(&self, request: &SubmissionRequest) -> Result<Option<SubmissionOutcome>> {
        let quiz = self
            .question_bank
            .fetch_quiz(&request.quiz_id)
            .await?
            .ok_or_else(|| anyhow!("Quiz {} not found", request.quiz_id))?;

        let questions = self
            .question_bank
            .load_questions(&request.quiz_id, request.difficulty)
            .await?;
        if questions.is_empty() {
            return Err(anyhow!(
                "Quiz {} has no gradable questions for {} difficulty",
                request.quiz_id,
                request.difficulty
            ));
        }

        // Ungraded quizzes record the attempt without a score. `None` here
        // means "ungraded", not a zero score.
        let score = if quiz.is_auto_check {
            let multiplier = difficulty_policy::resolve_multiplier(Some(&quiz), request.difficulty);
            Some(score::compute_score(
                &questions,
                &request.answers,
                multiplier,
            ))
        } else {
            None
        };

        let record = ScoreRecord {
            response_id: ObjectId::new().to_hex(),
            quiz_id: request.quiz_id.clone(),
            score,
            selected_difficulty: request.difficulty,
            tab_switch_count: request.tab_switch_count,
            answers: request.answers.clone(),
            started_at: request.started_at,
            submitted_at: Utc::now(),
        };

        let collection = self.mongo.collection::<ScoreRecord>("score_records");
        track_db_operation("insert_one", "score_records", async {
            RetryConfig::aggressive()
                .run(|| async { collection.insert_one(&record).await.map(|_| ()) })
                .await
                .context("Failed to persist score record")
        })
        .await?;

        tracing::info!(
            "Persisted score record {} for quiz {} (score={:?})",
            record.response_id,
            record.quiz_id,
            record.score
        );

        Ok(Some(SubmissionOutcome {
            response_id: record.response_id.clone(),
            score: record.score,
        }))
    }
}
