//! Axum route handlers for the Plan Session API.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::{DateTime, Utc};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::Profile;
use crate::models::transcript::Message;
use crate::planner::prompt_builder::{classify_goal, GoalKind};
use crate::session::PlanSession;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub goal_kind: GoalKind,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub busy: bool,
    pub messages: Vec<Message>,
}

impl SessionView {
    fn of(session: &PlanSession) -> Self {
        Self {
            session_id: session.id(),
            created_at: session.created_at(),
            busy: session.is_busy(),
            messages: session.transcript(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
///
/// Validates the submitted profile and starts a plan session. The plan streams
/// in the background; poll the session or subscribe to its events.
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(profile): Json<Profile>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let violations = profile.validate();
    if !violations.is_empty() {
        let details = violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.reason))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(AppError::Validation(details));
    }

    let goal_kind = classify_goal(&profile.financial_goal);
    let user = state.user.current().await;
    let session = state
        .sessions
        .create(profile, state.provider.clone(), user)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id(),
            goal_kind,
        }),
    ))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = find(&state, id).await?;
    Ok(Json(SessionView::of(&session)))
}

/// GET /api/v1/sessions/:id/events
///
/// Server-sent `transcript` events carrying the full transcript after every
/// change, starting with the current one. Ends when the session closes.
pub async fn handle_session_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let session = find(&state, id).await?;

    let updates = WatchStream::new(session.subscribe())
        .take_until(session.closed())
        .map(|transcript| {
            let event = Event::default()
                .event("transcript")
                .json_data(&transcript)
                .unwrap_or_else(|_| Event::default().event("error"));
            Ok(event)
        });

    Ok(Sse::new(updates).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

/// POST /api/v1/sessions/:id/messages
///
/// Accepts a follow-up and streams the reply in the background.
/// 409 while a previous reply is still streaming; the message is dropped.
pub async fn handle_send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<StatusCode, AppError> {
    let session = find(&state, id).await?;
    let turn = session.begin_turn(&request.text)?;
    state.sessions.spawn_turn(turn);
    Ok(StatusCode::ACCEPTED)
}

/// DELETE /api/v1/sessions/:id
///
/// Closes the session. The transcript upload runs detached; this returns
/// without waiting for it.
pub async fn handle_close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .close(id, state.sink.clone())
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
    info!(session_id = %id, "Session close requested");
    Ok(StatusCode::NO_CONTENT)
}

async fn find(state: &AppState, id: Uuid) -> Result<std::sync::Arc<PlanSession>, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}
