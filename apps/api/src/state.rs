use std::sync::Arc;

use crate::auth::user_context::UserContext;
use crate::auth::LoginClient;
use crate::llm_client::ChatProvider;
use crate::session::registry::SessionRegistry;
use crate::sink::TranscriptSink;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    /// Model provider every new session opens its chat against.
    pub provider: Arc<dyn ChatProvider>,
    /// Where transcripts go when a session closes.
    pub sink: Arc<dyn TranscriptSink>,
    pub login: LoginClient,
    pub user: UserContext,
}
