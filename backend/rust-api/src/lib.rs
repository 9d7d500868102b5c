use axum::{
    http::{header, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api/v1/sessions", sessions_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn sessions_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/", post(handlers::sessions::create_session))
        .route(
            "/{id}",
            get(handlers::sessions::get_session).delete(handlers::sessions::delete_session),
        )
        .route(
            "/{id}/difficulty",
            post(handlers::sessions::select_difficulty),
        )
        .route("/{id}/start", post(handlers::sessions::start_session))
        .route(
            "/{id}/answers/{question_id}",
            put(handlers::sessions::record_answer),
        )
        .route("/{id}/tab-switch", post(handlers::sessions::tab_switch))
        .route("/{id}/submit", post(handlers::sessions::submit_session))
        .route("/{id}/retry", post(handlers::sessions::retry_session))
        .route("/{id}/stream", get(handlers::sse::session_stream))
}
