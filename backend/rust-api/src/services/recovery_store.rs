use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::metrics::track_cache_operation;
use crate::models::question::Question;
use crate::utils::retry::RetryConfig;

/// Keyed backup store for finished attempts. Written on every submission;
/// read only on the fallback paths (gateway failure, in-memory score
/// unexpectedly absent, empty question list at submit time). Never a primary
/// data path.
#[async_trait]
pub trait RecoveryStore: Send + Sync {
    async fn save_score(&self, quiz_id: &str, score: u32) -> Result<()>;
    async fn load_score(&self, quiz_id: &str) -> Result<Option<u32>>;
    async fn save_questions(&self, quiz_id: &str, questions: &[Question]) -> Result<()>;
    async fn load_questions(&self, quiz_id: &str) -> Result<Option<Vec<Question>>>;
}

pub struct RedisRecoveryStore {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

fn score_key(quiz_id: &str) -> String {
    format!("quiz_score_{}", quiz_id)
}

fn questions_key(quiz_id: &str) -> String {
    format!("quiz_questions_{}", quiz_id)
}

impl RedisRecoveryStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            ttl_seconds: 86400,
        }
    }

    async fn setex(&self, key: &str, value: String) -> Result<()> {
        let conn = self.redis.clone();
        let ttl = self.ttl_seconds;
        track_cache_operation("setex", async {
            RetryConfig::default()
                .run(|| {
                    let mut conn = conn.clone();
                    let value = value.clone();
                    async move {
                        redis::cmd("SETEX")
                            .arg(key)
                            .arg(ttl)
                            .arg(value)
                            .query_async::<()>(&mut conn)
                            .await
                    }
                })
                .await
                .context("Failed to write recovery key")
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.redis.clone();
        track_cache_operation("get", async {
            redis::cmd("GET")
                .arg(key)
                .query_async::<Option<String>>(&mut conn)
                .await
                .context("Failed to read recovery key")
        })
        .await
    }
}

#[async_trait]
impl RecoveryStore for RedisRecoveryStore {
    async fn save_score(&self, quiz_id: &str, score: u32) -> Result<()> {
        self.setex(&score_key(quiz_id), score.to_string()).await
    }

    async fn load_score(&self, quiz_id: &str) -> Result<Option<u32>> {
        let raw = self.get(&score_key(quiz_id)).await?;
        Ok(raw.and_then(|v| v.parse::<u32>().ok()))
    }

    async fn save_questions(&self, quiz_id: &str, questions: &[Question]) -> Result<()> {
        let json =
            serde_json::to_string(questions).context("Failed to serialize question backup")?;
        self.setex(&questions_key(quiz_id), json).await
    }

    async fn load_questions(&self, quiz_id: &str) -> Result<Option<Vec<Question>>> {
        let raw = self.get(&questions_key(quiz_id)).await?;
        match raw {
            Some(json) => {
                let questions = serde_json::from_str(&json)
                    .context("Failed to deserialize question backup")?;
                Ok(Some(questions))
            }
            None => Ok(None),
        }
    }
}
