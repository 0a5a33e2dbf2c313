//! Plan Session: the conversational session controller.
//!
//! Lifecycle: created with a `Profile` → initial turn opens the chat and streams
//! the plan → follow-up turns, one at a time → teardown flushes the transcript
//! once and cancels whatever is still streaming.
//!
//! The transcript lives in a `watch` channel so renderers can subscribe to
//! every incremental update. Only turns of this session mutate it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::llm_client::{ChatProvider, ChatSession, LlmError};
use crate::models::profile::Profile;
use crate::models::transcript::{Message, Transcript};
use crate::models::user::User;
use crate::planner::prompt_builder::{build_initial_prompt, classify_goal};
use crate::sink::{detach_flush, TranscriptSink, TranscriptSubmission};

pub mod handlers;
pub mod registry;

/// Shown in the trailing model message until the first fragment arrives.
pub const PLACEHOLDER: &str = "...";
pub const PLAN_ERROR_TEXT: &str =
    "Sorry, I encountered an error while generating your plan. Please try again.";
pub const REPLY_ERROR_TEXT: &str =
    "My apologies, I ran into a problem. Could you please rephrase that?";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("A reply is still streaming; message ignored")]
    Busy,

    #[error("The chat session is not available")]
    Unavailable,

    #[error("Message text cannot be empty")]
    EmptyMessage,

    #[error("Session is closed")]
    Closed,
}

/// How a turn ended. Failures are already reflected in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed(String),
    Failed,
    Cancelled,
}

impl TurnOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TurnOutcome::Completed(_) => "completed",
            TurnOutcome::Failed => "failed",
            TurnOutcome::Cancelled => "cancelled",
        }
    }
}

pub struct PlanSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    profile: Arc<Profile>,
    user: Option<User>,
    chat: OnceLock<Box<dyn ChatSession>>,
    transcript: watch::Sender<Transcript>,
    busy: AtomicBool,
    closed: AtomicBool,
    cancel: CancellationToken,
    opened_at: Instant,
    /// Milliseconds after `opened_at` of the last client interaction.
    last_active_ms: AtomicU64,
}

impl PlanSession {
    /// Creates a session and claims its initial turn.
    ///
    /// The returned `Turn` opens the chat and streams the plan when run. Until
    /// it finishes, follow-ups are rejected as busy.
    pub fn start(
        profile: Profile,
        provider: Arc<dyn ChatProvider>,
        user: Option<User>,
    ) -> (Arc<Self>, Turn) {
        let (transcript, _) = watch::channel(Transcript::new());
        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            profile: Arc::new(profile),
            user,
            chat: OnceLock::new(),
            transcript,
            busy: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            opened_at: Instant::now(),
            last_active_ms: AtomicU64::new(0),
        });

        info!(
            session_id = %session.id,
            user = session.user.as_ref().map(|u| u.name.as_str()).unwrap_or("anonymous"),
            goal = ?classify_goal(&session.profile.financial_goal),
            "Plan session created"
        );

        let turn = Turn {
            session: Arc::clone(&session),
            kind: TurnKind::Initial(provider),
        };
        (session, turn)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Snapshot of the transcript.
    pub fn transcript(&self) -> Vec<Message> {
        self.transcript.borrow().to_vec()
    }

    /// Receives every transcript change, including each streamed fragment.
    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.transcript.subscribe()
    }

    /// Resolves once the session has been torn down.
    pub fn closed(&self) -> WaitForCancellationFutureOwned {
        self.cancel.clone().cancelled_owned()
    }

    /// Records client activity for idle expiry.
    pub fn touch(&self) {
        let elapsed = self.opened_at.elapsed().as_millis() as u64;
        self.last_active_ms.fetch_max(elapsed, Ordering::AcqRel);
    }

    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_active_ms.load(Ordering::Acquire));
        self.opened_at.elapsed().saturating_sub(last)
    }

    /// Nobody is streaming, watching, or talking to this session, and has not
    /// for at least `ttl`.
    pub fn is_abandoned(&self, ttl: Duration) -> bool {
        !self.is_busy() && self.transcript.receiver_count() == 0 && self.idle_for() >= ttl
    }

    /// Claims the session for a follow-up and records the user message.
    ///
    /// Rejected without touching the transcript while another turn is
    /// outstanding; rejected sends are dropped, not queued.
    pub fn begin_turn(self: &Arc<Self>, text: &str) -> Result<Turn, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(session_id = %self.id, "Ignoring message while a reply is streaming");
            return Err(SessionError::Busy);
        }

        // From here the turn owns the busy flag; dropping it releases the flag.
        let turn = Turn {
            session: Arc::clone(self),
            kind: TurnKind::FollowUp(text.to_string()),
        };

        // Teardown may have won the race since the first check.
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        if self.chat.get().is_none() {
            return Err(SessionError::Unavailable);
        }

        if !self.update(|t| t.push(Message::user(text))) {
            return Err(SessionError::Closed);
        }
        Ok(turn)
    }

    /// Sends a follow-up and waits for its reply to finish streaming.
    pub async fn send(self: &Arc<Self>, text: &str) -> Result<TurnOutcome, SessionError> {
        let turn = self.begin_turn(text)?;
        Ok(turn.run().await)
    }

    /// Closes the session: exactly one detached transcript flush, and any
    /// in-flight stream is cancelled. Later calls return `None`.
    pub fn teardown(
        &self,
        sink: Arc<dyn TranscriptSink>,
        tasks: &TaskTracker,
    ) -> Option<JoinHandle<()>> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return None;
        }

        let submission = TranscriptSubmission {
            messages: self.transcript(),
            form_data: Profile::clone(&self.profile),
        };
        self.cancel.cancel();

        info!(
            session_id = %self.id,
            messages = submission.messages.len(),
            streaming = self.is_busy(),
            "Plan session closed"
        );

        Some(detach_flush(sink, submission, tasks, self.id))
    }

    /// Applies `modify` unless the session is closed. The check runs under the
    /// channel lock, so a change either lands before the teardown snapshot or
    /// not at all.
    fn update(&self, modify: impl FnOnce(&mut Transcript)) -> bool {
        self.transcript.send_if_modified(|transcript| {
            if self.is_closed() {
                return false;
            }
            modify(transcript);
            true
        })
    }

    async fn open_chat(&self, provider: &dyn ChatProvider) -> Result<(), LlmError> {
        let chat = provider.open().await?;
        // The initial turn is the only writer.
        if self.chat.set(chat).is_err() {
            debug!(session_id = %self.id, "Chat handle already set");
        }
        Ok(())
    }

    /// Streams one reply into a trailing model message.
    async fn stream_reply(&self, prompt: &str, error_text: &str) -> TurnOutcome {
        let Some(chat) = self.chat.get() else {
            self.update(|t| t.push(Message::model(error_text)));
            return TurnOutcome::Failed;
        };

        if !self.update(|t| t.push(Message::model(PLACEHOLDER))) {
            return TurnOutcome::Cancelled;
        }

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return TurnOutcome::Cancelled,
            result = self.accumulate(chat.as_ref(), prompt) => result,
        };

        match result {
            Ok(reply) => TurnOutcome::Completed(reply),
            Err(e) => {
                error!(session_id = %self.id, "Streaming reply failed: {e}");
                self.update(|t| {
                    t.replace_last_model(error_text);
                });
                TurnOutcome::Failed
            }
        }
    }

    async fn accumulate(&self, chat: &dyn ChatSession, prompt: &str) -> Result<String, LlmError> {
        let mut fragments = chat.send(prompt).await?;
        let mut buffer = String::new();

        while let Some(fragment) = fragments.next().await {
            buffer.push_str(&fragment?);
            self.update(|t| {
                t.replace_last_model(buffer.as_str());
            });
        }

        // A reply with no fragments must not leave the placeholder behind.
        if buffer.is_empty() {
            self.update(|t| {
                t.replace_last_model("");
            });
        }
        Ok(buffer)
    }
}

enum TurnKind {
    Initial(Arc<dyn ChatProvider>),
    FollowUp(String),
}

/// A claimed turn. Holds the session's busy flag until run to completion or dropped.
pub struct Turn {
    session: Arc<PlanSession>,
    kind: TurnKind,
}

impl Turn {
    pub async fn run(self) -> TurnOutcome {
        let session = Arc::clone(&self.session);
        let started = std::time::Instant::now();

        let outcome = match &self.kind {
            TurnKind::Initial(provider) => {
                let opened = tokio::select! {
                    biased;
                    _ = session.cancel.cancelled() => return TurnOutcome::Cancelled,
                    opened = session.open_chat(provider.as_ref()) => opened,
                };
                match opened {
                    Ok(()) => {
                        let prompt = build_initial_prompt(&session.profile);
                        session.stream_reply(&prompt, PLAN_ERROR_TEXT).await
                    }
                    Err(e) => {
                        error!(session_id = %session.id, "Chat initialization failed: {e}");
                        session.update(|t| t.push(Message::model(PLAN_ERROR_TEXT)));
                        TurnOutcome::Failed
                    }
                }
            }
            TurnKind::FollowUp(text) => session.stream_reply(text, REPLY_ERROR_TEXT).await,
        };

        info!(
            session_id = %session.id,
            outcome = outcome.label(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Turn finished"
        );
        outcome
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        self.session.busy.store(false, Ordering::Release);
    }
}
