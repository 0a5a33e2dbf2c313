//! HTTP serving with graceful shutdown.
//!
//! On the shutdown signal every session is torn down first, so open event
//! streams end and in-flight requests can drain. Once the listener has
//! stopped, pending turns and transcript flushes are awaited.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::session::registry::SessionRegistry;
use crate::sink::TranscriptSink;

pub async fn serve(
    listener: TcpListener,
    app: Router,
    sessions: SessionRegistry,
    sink: Arc<dyn TranscriptSink>,
    signal: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let closing = sessions.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            info!("Shutdown signal received, closing sessions");
            closing.teardown_all(sink).await;
        })
        .await?;

    sessions.wait().await;
    Ok(())
}
