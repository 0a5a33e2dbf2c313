//! Scripted in-memory provider for session tests. No network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Notify;

use super::{ChatProvider, ChatSession, FragmentStream, LlmError};

/// One scripted reply, consumed by the next `send`.
pub enum Reply {
    /// Streams the fragments, then ends cleanly.
    Fragments(Vec<&'static str>),
    /// Streams the fragments, then fails.
    FailAfter(Vec<&'static str>),
    /// `send` itself fails before any fragment.
    Reject,
    /// Waits for the gate before streaming the fragments.
    Held(Vec<&'static str>, Arc<Notify>),
}

#[derive(Clone, Default)]
pub struct ScriptedProvider {
    fail_open: bool,
    replies: Arc<Mutex<VecDeque<Reply>>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            ..Self::default()
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Every text passed to `send`, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn open(&self) -> Result<Box<dyn ChatSession>, LlmError> {
        if self.fail_open {
            return Err(LlmError::Api {
                status: 503,
                message: "provider unavailable".to_string(),
            });
        }
        Ok(Box::new(ScriptedChat {
            replies: Arc::clone(&self.replies),
            sent: Arc::clone(&self.sent),
        }))
    }
}

struct ScriptedChat {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ChatSession for ScriptedChat {
    async fn send(&self, text: &str) -> Result<FragmentStream, LlmError> {
        self.sent.lock().unwrap().push(text.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Stream("no scripted reply".to_string()))?;

        let ok = |fragments: Vec<&'static str>| {
            fragments
                .into_iter()
                .map(|f| Ok(f.to_string()))
                .collect::<Vec<_>>()
        };

        Ok(match reply {
            Reply::Fragments(fragments) => stream::iter(ok(fragments)).boxed(),
            Reply::FailAfter(fragments) => {
                let mut items = ok(fragments);
                items.push(Err(LlmError::Stream("connection reset".to_string())));
                stream::iter(items).boxed()
            }
            Reply::Reject => {
                return Err(LlmError::Api {
                    status: 500,
                    message: "internal".to_string(),
                })
            }
            Reply::Held(fragments, gate) => {
                let wait = stream::once(async move { gate.notified().await })
                    .filter_map(|_| async { None::<Result<String, LlmError>> });
                wait.chain(stream::iter(ok(fragments))).boxed()
            }
        })
    }
}
