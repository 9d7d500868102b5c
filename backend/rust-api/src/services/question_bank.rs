use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Database;

use crate::metrics::track_db_operation;
use crate::models::question::{Question, QuestionOption};
use crate::models::{Difficulty, Quiz};

/// Read-side boundary for quiz content. "No data" is `Ok(None)` / `Ok(vec![])`,
/// never an error; errors mean transport failure.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>>;

    /// Ordered question list for one difficulty, normalized to the canonical
    /// shape. An empty result means "difficulty not playable".
    async fn load_questions(&self, quiz_id: &str, difficulty: Difficulty) -> Result<Vec<Question>>;
}

pub struct MongoQuestionBank {
    mongo: Database,
}

impl MongoQuestionBank {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    async fn fetch_question_docs(&self, filter: Document) -> Result<Vec<Document>> {
        let collection = self.mongo.collection::<Document>("questions");
        track_db_operation("find", "questions", async {
            collection
                .find(filter)
                .sort(doc! { "position": 1 })
                .await
                .context("Failed to query questions collection")?
                .try_collect()
                .await
                .context("Failed to read questions cursor")
        })
        .await
    }
}

#[async_trait]
impl QuestionBank for MongoQuestionBank {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>> {
        let collection = self.mongo.collection::<Quiz>("quizzes");
        track_db_operation("find_one", "quizzes", async {
            collection
                .find_one(doc! { "_id": quiz_id })
                .await
                .context("Failed to query quizzes collection")
        })
        .await
    }

    async fn load_questions(&self, quiz_id: &str, difficulty: Difficulty) -> Result<Vec<Question>> {
        let mut docs = self
            .fetch_question_docs(doc! { "quiz_id": quiz_id, "difficulty": difficulty.as_str() })
            .await?;

        // Quizzes created before difficulty tiers exist store one untagged
        // question set shared by every difficulty.
        if docs.is_empty() {
            tracing::debug!(
                "No {} questions for quiz {}, trying legacy set",
                difficulty,
                quiz_id
            );
            docs = self
                .fetch_question_docs(doc! { "quiz_id": quiz_id, "difficulty": Bson::Null })
                .await?;
        }

        let loaded_at = Utc::now().timestamp_millis();
        let questions: Vec<Question> = docs
            .iter()
            .enumerate()
            .filter_map(|(position, doc)| {
                let normalized = normalize_question(doc, position, loaded_at);
                if normalized.is_none() {
                    tracing::warn!(
                        "Skipping unrecoverable question record at position {} of quiz {}",
                        position,
                        quiz_id
                    );
                }
                normalized
            })
            .collect();

        tracing::info!(
            "Loaded {} questions for quiz {} at {} difficulty",
            questions.len(),
            quiz_id,
            difficulty
        );
        Ok(questions)
    }
}

/// Normalizes one stored question record into the canonical shape, tolerating
/// the legacy storage variants:
/// - `options` as an array of strings or of `{id?, text, is_correct?}` docs;
/// - no `options` field but numeric-keyed option fields (`"0"`, `"1"`, ...),
///   where the key equal to `correct_index` marks the correct option;
/// - a missing `_id`, replaced by a deterministic position+timestamp id so
///   identity joins cannot collide across loads.
///
/// Returns `None` only when no options can be produced by any path; the
/// caller skips such records instead of failing the whole load.
pub fn normalize_question(doc: &Document, position: usize, loaded_at: i64) -> Option<Question> {
    let text = doc.get_str("text").ok()?.to_string();

    let id = match doc.get("_id") {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(s)) if !s.is_empty() => s.clone(),
        _ => format!("q{}-{}", position, loaded_at),
    };

    let stored_correct = doc
        .get_i32("correct_index")
        .map(|v| v as i64)
        .or_else(|_| doc.get_i64("correct_index"))
        .ok()
        .and_then(|v| u32::try_from(v).ok());

    let mut options = Vec::new();
    let mut correct_index = stored_correct;

    if let Ok(raw_options) = doc.get_array("options") {
        for (index, raw) in raw_options.iter().enumerate() {
            let index = index as u32;
            match raw {
                Bson::String(text) => options.push(QuestionOption {
                    id: format!("{}-{}", id, index),
                    text: text.clone(),
                    is_correct: stored_correct == Some(index),
                }),
                Bson::Document(option_doc) => {
                    let Ok(option_text) = option_doc.get_str("text") else {
                        continue;
                    };
                    let flagged = option_doc.get_bool("is_correct").unwrap_or(false);
                    if flagged && correct_index.is_none() {
                        correct_index = Some(index);
                    }
                    options.push(QuestionOption {
                        id: option_doc
                            .get_str("id")
                            .map(str::to_string)
                            .unwrap_or_else(|_| format!("{}-{}", id, index)),
                        text: option_text.to_string(),
                        is_correct: flagged || stored_correct == Some(index),
                    });
                }
                _ => {}
            }
        }
    }

    // Legacy numeric-keyed storage: option texts live in fields "0", "1", ...
    // Keys can be sparse, and `correct_index` names a key, not a position in
    // the synthesized list.
    if options.is_empty() {
        let mut keyed: Vec<(u32, String)> = doc
            .iter()
            .filter_map(|(key, value)| {
                let index = key.parse::<u32>().ok()?;
                match value {
                    Bson::String(s) => Some((index, s.clone())),
                    _ => None,
                }
            })
            .collect();
        keyed.sort_by_key(|(index, _)| *index);

        let correct_position = stored_correct
            .and_then(|key| keyed.iter().position(|(index, _)| *index == key))
            .map(|position| position as u32);

        options = keyed
            .into_iter()
            .enumerate()
            .map(|(position, (_, text))| QuestionOption {
                id: format!("{}-{}", id, position),
                text,
                is_correct: correct_position == Some(position as u32),
            })
            .collect();
        correct_index = correct_position;
    }

    if options.is_empty() {
        return None;
    }

    Some(Question {
        id,
        text,
        options,
        correct_index: correct_index.unwrap_or(0),
    })
}
