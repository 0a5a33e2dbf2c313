pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::session::handlers as sessions;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Plan sessions
        .route("/api/v1/sessions", post(sessions::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(sessions::handle_get_session).delete(sessions::handle_close_session),
        )
        .route(
            "/api/v1/sessions/:id/events",
            get(sessions::handle_session_events),
        )
        .route(
            "/api/v1/sessions/:id/messages",
            post(sessions::handle_send_message),
        )
        // Login
        .route("/api/v1/login", post(auth::handle_login))
        .route("/api/v1/logout", post(auth::handle_logout))
        .route("/api/v1/me", get(auth::handle_me))
        .with_state(state)
}
