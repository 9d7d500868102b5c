use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::error::SessionError;
use crate::models::session::{CreateSessionRequest, RecordAnswerRequest, SelectDifficultyRequest};
use crate::services::AppState;

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, SessionError> {
    tracing::info!("Creating session for quiz_id={}", req.quiz_id);
    let view = state.service.create_session(&req.quiz_id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, SessionError> {
    let view = state.service.get_view(&session_id).await?;
    Ok(Json(view))
}

pub async fn select_difficulty(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<SelectDifficultyRequest>,
) -> Result<impl IntoResponse, SessionError> {
    tracing::info!(
        "Selecting {} difficulty for session {}",
        req.difficulty,
        session_id
    );
    let view = state
        .service
        .select_difficulty(&session_id, req.difficulty)
        .await?;
    Ok(Json(view))
}

pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, SessionError> {
    tracing::info!("Starting session {}", session_id);
    let view = state.service.start(&session_id).await?;
    Ok(Json(view))
}

pub async fn record_answer(
    State(state): State<Arc<AppState>>,
    Path((session_id, question_id)): Path<(String, String)>,
    Json(req): Json<RecordAnswerRequest>,
) -> Result<impl IntoResponse, SessionError> {
    let view = state
        .service
        .record_answer(&session_id, &question_id, req.selected_option_index)
        .await?;
    Ok(Json(view))
}

pub async fn tab_switch(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, SessionError> {
    let response = state.service.tab_switch(&session_id).await?;
    Ok(Json(response))
}

pub async fn submit_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, SessionError> {
    tracing::info!("Submitting session {}", session_id);
    let result = state.service.submit(&session_id).await?;
    Ok(Json(result))
}

pub async fn retry_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, SessionError> {
    tracing::info!("Retrying session {}", session_id);
    let view = state.service.retry(&session_id).await?;
    Ok(Json(view))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, SessionError> {
    state.service.teardown(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
