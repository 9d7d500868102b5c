#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use quizdeck_api::config::Config;
use quizdeck_api::create_router;
use quizdeck_api::models::answer::{SubmissionOutcome, SubmissionRequest};
use quizdeck_api::models::question::{Question, QuestionOption};
use quizdeck_api::models::{Difficulty, DifficultySetting, Quiz};
use quizdeck_api::services::question_bank::QuestionBank;
use quizdeck_api::services::recovery_store::RecoveryStore;
use quizdeck_api::services::submission_gateway::SubmissionGateway;
use quizdeck_api::services::{difficulty_policy, score, AppState};

pub fn make_questions(prefix: &str, count: usize, correct_index: u32) -> Vec<Question> {
    (0..count)
        .map(|i| Question {
            id: format!("{}-q{}", prefix, i),
            text: format!("Question {} of {}", i + 1, prefix),
            options: (0..4)
                .map(|o| QuestionOption {
                    id: format!("{}-q{}-{}", prefix, i, o),
                    text: format!("Option {}", o),
                    is_correct: o == correct_index,
                })
                .collect(),
            correct_index,
        })
        .collect()
}

/// In-memory stand-in for the MongoDB question bank. Exact lookups only;
/// a difficulty with no entry is simply not playable.
pub struct MemoryQuestionBank {
    quizzes: HashMap<String, Quiz>,
    questions: HashMap<(String, Difficulty), Vec<Question>>,
}

impl MemoryQuestionBank {
    pub fn with_fixtures() -> Self {
        let mut quizzes = HashMap::new();
        let mut questions = HashMap::new();

        // Graded quiz with per-difficulty overrides on easy and hard.
        let mut tiered = Quiz {
            id: "quiz-tiered".into(),
            title: "Tiered basics".into(),
            description: Some("Multi-difficulty fixture".into()),
            duration_minutes: 10,
            is_auto_check: true,
            available_difficulties: vec![Difficulty::Easy, Difficulty::Medium, Difficulty::Hard],
            difficulty_settings: Default::default(),
        };
        tiered.difficulty_settings.insert(
            Difficulty::Easy,
            DifficultySetting {
                duration_minutes: Some(45),
                points_multiplier: Some(1.0),
            },
        );
        tiered.difficulty_settings.insert(
            Difficulty::Hard,
            DifficultySetting {
                duration_minutes: Some(20),
                points_multiplier: Some(2.0),
            },
        );
        questions.insert(
            ("quiz-tiered".to_string(), Difficulty::Easy),
            make_questions("easy", 4, 1),
        );
        questions.insert(
            ("quiz-tiered".to_string(), Difficulty::Medium),
            make_questions("medium", 4, 1),
        );
        questions.insert(
            ("quiz-tiered".to_string(), Difficulty::Hard),
            make_questions("hard", 5, 1),
        );
        quizzes.insert(tiered.id.clone(), tiered);

        // No medium tier, and hard has no questions at all.
        let partial = Quiz {
            id: "quiz-partial".into(),
            title: "Partial coverage".into(),
            description: None,
            duration_minutes: 5,
            is_auto_check: true,
            available_difficulties: vec![Difficulty::Easy, Difficulty::Hard],
            difficulty_settings: Default::default(),
        };
        questions.insert(
            ("quiz-partial".to_string(), Difficulty::Easy),
            make_questions("partial-easy", 3, 0),
        );
        quizzes.insert(partial.id.clone(), partial);

        // Manually graded: the gateway records the attempt without a score.
        let ungraded = Quiz {
            id: "quiz-ungraded".into(),
            title: "Essay-style".into(),
            description: None,
            duration_minutes: 15,
            is_auto_check: false,
            available_difficulties: vec![Difficulty::Medium],
            difficulty_settings: Default::default(),
        };
        questions.insert(
            ("quiz-ungraded".to_string(), Difficulty::Medium),
            make_questions("ungraded", 2, 2),
        );
        quizzes.insert(ungraded.id.clone(), ungraded);

        Self { quizzes, questions }
    }
}

#[async_trait]
impl QuestionBank for MemoryQuestionBank {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>> {
        Ok(self.quizzes.get(quiz_id).cloned())
    }

    async fn load_questions(&self, quiz_id: &str, difficulty: Difficulty) -> Result<Vec<Question>> {
        Ok(self
            .questions
            .get(&(quiz_id.to_string(), difficulty))
            .cloned()
            .unwrap_or_default())
    }
}

/// Gateway double that grades with the same computation the production
/// gateway uses, and can be switched into failure mode.
pub struct MemoryGateway {
    bank: Arc<MemoryQuestionBank>,
    pub fail: AtomicBool,
    pub submissions: Mutex<Vec<(SubmissionRequest, Option<u32>)>>,
}

impl MemoryGateway {
    pub fn new(bank: Arc<MemoryQuestionBank>) -> Self {
        Self {
            bank,
            fail: AtomicBool::new(false),
            submissions: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SubmissionGateway for MemoryGateway {
    async fn submit(&self, request: &SubmissionRequest) -> Result<Option<SubmissionOutcome>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("gateway offline"));
        }

        let quiz = self
            .bank
            .fetch_quiz(&request.quiz_id)
            .await?
            .ok_or_else(|| anyhow!("quiz {} not found", request.quiz_id))?;
        let questions = self
            .bank
            .load_questions(&request.quiz_id, request.difficulty)
            .await?;
        if questions.is_empty() {
            return Err(anyhow!("no gradable questions"));
        }

        let graded = if quiz.is_auto_check {
            let multiplier = difficulty_policy::resolve_multiplier(Some(&quiz), request.difficulty);
            Some(score::compute_score(&questions, &request.answers, multiplier))
        } else {
            None
        };

        let mut submissions = self.submissions.lock().unwrap();
        submissions.push((request.clone(), graded));
        Ok(Some(SubmissionOutcome {
            response_id: format!("resp-{}", submissions.len()),
            score: graded,
        }))
    }
}

#[derive(Default)]
pub struct MemoryRecovery {
    pub scores: Mutex<HashMap<String, u32>>,
    pub questions: Mutex<HashMap<String, Vec<Question>>>,
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

pub struct TestApp {
    pub app: Router,
    pub gateway: Arc<MemoryGateway>,
    pub recovery: Arc<MemoryRecovery>,
}

pub fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let bank = Arc::new(MemoryQuestionBank::with_fixtures());
    let gateway = Arc::new(MemoryGateway::new(bank.clone()));
    let recovery = Arc::new(MemoryRecovery::default());

    let state = AppState::with_components(
        Config::for_tests(),
        bank,
        gateway.clone(),
        recovery.clone(),
    );

    TestApp {
        app: create_router(Arc::new(state)),
        gateway,
        recovery,
    }
}

/// Fires one request at the router and returns `(status, json body)`.
pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Creates a session for `quiz_id` and returns its id.
pub async fn create_session(app: &Router, quiz_id: &str) -> String {
    let (status, json) = request(
        app,
        "POST",
        "/api/v1/sessions",
        Some(serde_json::json!({ "quiz_id": quiz_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_string()
}

/// Answers every question in the view with the given option index.
pub async fn answer_all(app: &Router, session_id: &str, view: &Value, option_index: u32) {
    for question in view["questions"].as_array().unwrap() {
        let question_id = question["id"].as_str().unwrap();
        let (status, _) = request(
            app,
            "PUT",
            &format!("/api/v1/sessions/{}/answers/{}", session_id, question_id),
            Some(serde_json::json!({ "selected_option_index": option_index })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
