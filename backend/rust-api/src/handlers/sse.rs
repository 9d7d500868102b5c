use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use chrono::Utc;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::{
    models::session::SessionPhase,
    models::timer::{TimeExpired, TimerEvent, TimerTick},
    services::session_service::SessionService,
    services::AppState,
};

/// SSE endpoint for timer events.
/// GET /api/v1/sessions/{id}/stream
///
/// The stream is a read-only projection of the session's clock; the actual
/// countdown runs in the session engine's tick task. The stream ends when
/// the session completes, is torn down, or has reported expiry.
pub async fn session_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state.service.timer_snapshot(&session_id).await.is_none() {
        return Err((StatusCode::NOT_FOUND, "Session not found".to_string()));
    }

    tracing::info!("Client connected to SSE stream: session={}", session_id);
    let stream = create_timer_stream(state.service.clone(), session_id, tick_interval_ms());

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn tick_interval_ms() -> u64 {
    std::env::var("SSE_TICK_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(1000)
}

fn create_timer_stream(
    service: SessionService,
    session_id: String,
    tick_interval_ms: u64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(
        (service, session_id, false),
        move |(service, session_id, expiry_sent)| async move {
            if expiry_sent {
                return None;
            }
            sleep(Duration::from_millis(tick_interval_ms)).await;

            let snapshot = service.timer_snapshot(&session_id).await?;

            if snapshot.expired {
                let expired_event = TimerEvent::TimeExpired(TimeExpired {
                    session_id: session_id.clone(),
                    timestamp: Utc::now(),
                    message: "Time limit exceeded".to_string(),
                });
                let event = Event::default()
                    .event(expired_event.event_name())
                    .data(expired_event.to_sse_data());
                return Some((Ok(event), (service, session_id, true)));
            }

            if snapshot.phase == SessionPhase::Completed {
                return None;
            }

            let tick_event = TimerEvent::TimerTick(TimerTick {
                session_id: session_id.clone(),
                remaining_seconds: snapshot.remaining_seconds,
                elapsed_seconds: snapshot
                    .total_seconds
                    .saturating_sub(snapshot.remaining_seconds),
                total_seconds: snapshot.total_seconds,
                timestamp: Utc::now(),
            });
            let event = Event::default()
                .event(tick_event.event_name())
                .data(tick_event.to_sse_data());

            Some((Ok(event), (service, session_id, false)))
        },
    )
}
