//! Live sessions, keyed by id, plus the task scope every turn and flush runs in.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};
use uuid::Uuid;

use crate::llm_client::ChatProvider;
use crate::models::profile::Profile;
use crate::models::user::User;
use crate::session::{PlanSession, Turn};
use crate::sink::TranscriptSink;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<PlanSession>>>>,
    tasks: TaskTracker,
    /// Cancelled when the process starts shutting down; stops the reaper.
    stopping: CancellationToken,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session and starts its initial turn in the background.
    pub async fn create(
        &self,
        profile: Profile,
        provider: Arc<dyn ChatProvider>,
        user: Option<User>,
    ) -> Arc<PlanSession> {
        let (session, turn) = PlanSession::start(profile, provider, user);
        self.sessions
            .write()
            .await
            .insert(session.id(), Arc::clone(&session));
        let live_sessions = self.len().await;
        debug!(live_sessions, "Session registered");
        self.spawn_turn(turn);
        session
    }

    pub fn spawn_turn(&self, turn: Turn) -> JoinHandle<()> {
        self.tasks.spawn(async move {
            turn.run().await;
        })
    }

    /// Looks up a session. Every lookup counts as client activity.
    pub async fn get(&self, id: Uuid) -> Option<Arc<PlanSession>> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        session.touch();
        Some(session)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Removes and tears down one session. `None` if the id is unknown.
    pub async fn close(
        &self,
        id: Uuid,
        sink: Arc<dyn TranscriptSink>,
    ) -> Option<JoinHandle<()>> {
        let session = self.sessions.write().await.remove(&id)?;
        session.teardown(sink, &self.tasks)
    }

    /// Tears down every session nobody has used for `ttl`. Returns how many.
    pub async fn reap_idle(&self, sink: Arc<dyn TranscriptSink>, ttl: Duration) -> usize {
        let expired: Vec<Arc<PlanSession>> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<Uuid> = sessions
                .values()
                .filter(|session| session.is_abandoned(ttl))
                .map(|session| session.id())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &expired {
            info!(
                session_id = %session.id(),
                idle_secs = session.idle_for().as_secs(),
                "Closing abandoned session"
            );
            session.teardown(Arc::clone(&sink), &self.tasks);
        }
        if !expired.is_empty() {
            let live_sessions = self.len().await;
            debug!(live_sessions, "Idle sessions reaped");
        }
        expired.len()
    }

    /// Periodically closes abandoned sessions until shutdown begins.
    pub fn spawn_reaper(&self, sink: Arc<dyn TranscriptSink>, ttl: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        let period = (ttl / 2).max(Duration::from_secs(1));
        self.tasks.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = registry.stopping.cancelled() => break,
                    _ = ticker.tick() => {
                        registry.reap_idle(Arc::clone(&sink), ttl).await;
                    }
                }
            }
            debug!("Session reaper stopped");
        })
    }

    /// Tears down every live session and stops the reaper. Open event streams
    /// end as their sessions close. Returns how many sessions were closed.
    pub async fn teardown_all(&self, sink: Arc<dyn TranscriptSink>) -> usize {
        self.stopping.cancel();
        let sessions: Vec<_> = self.sessions.write().await.drain().collect();
        let count = sessions.len();
        for (_, session) in sessions {
            session.teardown(Arc::clone(&sink), &self.tasks);
        }
        info!(sessions = count, "All sessions closed");
        count
    }

    /// Waits for every turn and transcript flush to finish.
    pub async fn wait(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        info!("All transcripts flushed");
    }
}
