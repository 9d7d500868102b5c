use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::session::SessionPhase;
use crate::models::Difficulty;

/// User-visible session failures. Everything recoverable (gateway failure,
/// answer drift, legacy question shapes) is handled inside the session
/// engine and never surfaces here; these are the conditions that block an
/// operation outright.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Quiz {0} not found")]
    QuizNotFound(String),

    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("Question {0} not found in this session")]
    QuestionNotFound(String),

    #[error("No questions found for {difficulty} difficulty level")]
    DataUnavailable { difficulty: Difficulty },

    #[error("Difficulty {difficulty} is not available for this quiz")]
    DifficultyUnavailable { difficulty: Difficulty },

    #[error("Cannot submit: {0}")]
    CannotSubmit(String),

    #[error("Cannot {action} while the session is {phase:?}")]
    InvalidPhase {
        action: &'static str,
        phase: SessionPhase,
    },

    #[error("Option index {index} does not exist for question {question_id}")]
    InvalidOption { question_id: String, index: u32 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SessionError {
    pub fn status(&self) -> StatusCode {
        match self {
            SessionError::QuizNotFound(_)
            | SessionError::SessionNotFound(_)
            | SessionError::QuestionNotFound(_) => StatusCode::NOT_FOUND,
            SessionError::DataUnavailable { .. }
            | SessionError::CannotSubmit(_)
            | SessionError::InvalidPhase { .. } => StatusCode::CONFLICT,
            SessionError::DifficultyUnavailable { .. } | SessionError::InvalidOption { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        if let SessionError::Internal(e) = &self {
            tracing::error!("Internal session error: {:#}", e);
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
