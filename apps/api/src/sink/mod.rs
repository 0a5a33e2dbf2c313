//! Transcript Sink: the one-shot transcript upload performed at session end.
//!
//! Best effort by contract. No retry, no queue. A failed upload is logged and
//! dropped; nothing here may fail session teardown.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::profile::Profile;
use crate::models::transcript::Message;

#[cfg(test)]
pub mod testing;

/// Request body understood by the transcript collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptSubmission {
    pub messages: Vec<Message>,
    #[serde(rename = "formData")]
    pub form_data: Profile,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Collector returned status {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn flush(&self, submission: &TranscriptSubmission) -> Result<(), SinkError>;
}

/// POSTs the submission as JSON to a fixed collector URL.
pub struct HttpTranscriptSink {
    client: Client,
    url: String,
}

impl HttpTranscriptSink {
    pub fn new(url: String, timeout: Duration) -> Result<Self, SinkError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url,
        })
    }
}

#[async_trait]
impl TranscriptSink for HttpTranscriptSink {
    async fn flush(&self, submission: &TranscriptSubmission) -> Result<(), SinkError> {
        let response = self.client.post(&self.url).json(submission).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Runs one flush on the tracker and returns immediately.
///
/// The handle may be awaited for observation; dropping it does not cancel the
/// upload. Failures end as an error log line.
pub fn detach_flush(
    sink: Arc<dyn TranscriptSink>,
    submission: TranscriptSubmission,
    tasks: &TaskTracker,
    session_id: Uuid,
) -> JoinHandle<()> {
    tasks.spawn(async move {
        let count = submission.messages.len();
        match sink.flush(&submission).await {
            Ok(()) => info!(%session_id, messages = count, "Transcript submitted"),
            Err(e) => error!(%session_id, "Failed to send transcript: {e}"),
        }
    })
}
