use std::sync::Arc;

use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;

use crate::config::Config;

pub mod difficulty_policy;
pub mod question_bank;
pub mod recovery_store;
pub mod score;
pub mod session_service;
pub mod submission_gateway;

use question_bank::{MongoQuestionBank, QuestionBank};
use recovery_store::{RecoveryStore, RedisRecoveryStore};
use session_service::SessionService;
use submission_gateway::{MongoSubmissionGateway, SubmissionGateway};

pub struct AppState {
    pub config: Config,
    pub service: SessionService,
}

impl AppState {
    /// Production wiring: MongoDB for quiz content and score records, Redis
    /// for the recovery store.
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo: Database = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");
        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;
        tracing::info!("Redis connection established");

        let question_bank: Arc<dyn QuestionBank> = Arc::new(MongoQuestionBank::new(mongo.clone()));
        let gateway: Arc<dyn SubmissionGateway> =
            Arc::new(MongoSubmissionGateway::new(mongo, question_bank.clone()));
        let recovery: Arc<dyn RecoveryStore> = Arc::new(RedisRecoveryStore::new(redis));

        Ok(Self {
            config,
            service: SessionService::new(question_bank, gateway, recovery),
        })
    }

    /// Wiring with explicit boundary implementations. Used by the test
    /// harness to run the full router against in-memory collaborators.
    pub fn with_components(
        config: Config,
        question_bank: Arc<dyn QuestionBank>,
        gateway: Arc<dyn SubmissionGateway>,
        recovery: Arc<dyn RecoveryStore>,
    ) -> Self {
        Self {
            config,
            service: SessionService::new(question_bank, gateway, recovery),
        }
    }
}
