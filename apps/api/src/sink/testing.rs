//! Recording sink for session tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{SinkError, TranscriptSink, TranscriptSubmission};

#[derive(Clone, Default)]
pub struct RecordingSink {
    fail: bool,
    flushed: Arc<Mutex<Vec<TranscriptSubmission>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the submission, then reports a collector failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn flushed(&self) -> Vec<TranscriptSubmission> {
        self.flushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptSink for RecordingSink {
    async fn flush(&self, submission: &TranscriptSubmission) -> Result<(), SinkError> {
        self.flushed.lock().unwrap().push(submission.clone());
        if self.fail {
            return Err(SinkError::Status {
                status: 502,
                body: "collector down".to_string(),
            });
        }
        Ok(())
    }
}
