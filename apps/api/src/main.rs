mod auth;
mod config;
mod errors;
mod llm_client;
mod models;
mod planner;
mod routes;
mod server;
mod session;
mod sink;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::user_context::UserContext;
use crate::auth::LoginClient;
use crate::config::Config;
use crate::llm_client::gemini::GeminiProvider;
use crate::routes::build_router;
use crate::session::registry::SessionRegistry;
use crate::sink::{HttpTranscriptSink, TranscriptSink};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting OptiLife API v{}", env!("CARGO_PKG_VERSION"));

    let timeout = Duration::from_secs(config.llm_timeout_secs);

    // Initialize LLM provider
    let provider = GeminiProvider::new(
        config.gemini_api_key.clone(),
        &config.gemini_base_url,
        timeout,
    )?;
    info!("LLM provider initialized (model: {})", llm_client::MODEL);

    // Transcript collector and login endpoint
    let sink: Arc<dyn TranscriptSink> =
        Arc::new(HttpTranscriptSink::new(config.collector_url.clone(), timeout)?);
    info!("Transcripts will be submitted to {}", config.collector_url);
    let login = LoginClient::new(config.login_url.clone(), timeout)?;
    let user = UserContext::load(&config.user_store_path).await;

    // Build app state
    let sessions = SessionRegistry::new();
    let idle_ttl = Duration::from_secs(config.session_idle_secs);
    sessions.spawn_reaper(Arc::clone(&sink), idle_ttl);
    info!("Sessions idle for {}s are closed", idle_ttl.as_secs());
    let state = AppState {
        sessions: sessions.clone(),
        provider: Arc::new(provider),
        sink: Arc::clone(&sink),
        login,
        user,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    server::serve(listener, app, sessions, sink, shutdown_signal()).await?;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
