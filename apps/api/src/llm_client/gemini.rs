//! Google Gemini chat provider (Generative Language REST API).
//!
//! `open()` probes the model endpoint so an unreachable provider or a rejected
//! key fails at session start. Each `send()` posts the whole conversation to
//! `streamGenerateContent?alt=sse` and yields text parts as they arrive. A turn
//! is committed to the history only when its stream ends cleanly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{ChatProvider, ChatSession, FragmentStream, LlmError, MODEL};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiProvider {
    /// `timeout` bounds connecting and waiting for response headers; a
    /// streaming body may take longer.
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    async fn open(&self) -> Result<Box<dyn ChatSession>, LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::Config("API key is empty".to_string()));
        }

        let url = format!("{}/v1beta/models/{MODEL}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        debug!(model = MODEL, "Gemini chat session opened");

        Ok(Box::new(GeminiChat {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            stream_url: format!(
                "{}/v1beta/models/{MODEL}:streamGenerateContent?alt=sse",
                self.base_url
            ),
            timeout: self.timeout,
            history: Arc::new(Mutex::new(Vec::new())),
        }))
    }
}

struct GeminiChat {
    client: Client,
    api_key: String,
    stream_url: String,
    timeout: Duration,
    history: Arc<Mutex<Vec<GeminiContent>>>,
}

#[async_trait]
impl ChatSession for GeminiChat {
    async fn send(&self, text: &str) -> Result<FragmentStream, LlmError> {
        let user_turn = GeminiContent::text("user", text);

        let mut contents = self.history.lock().await.clone();
        contents.push(user_turn.clone());
        let body = GeminiRequest { contents };

        let request = self
            .client
            .post(&self.stream_url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body);

        let mut events =
            EventSource::new(request).map_err(|e| LlmError::Stream(e.to_string()))?;
        // A partially streamed reply is never replayed.
        events.set_retry_policy(Box::new(Never));

        let opened = tokio::time::timeout(self.timeout, events.next())
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))?;

        match opened {
            Some(Ok(Event::Open)) => {}
            Some(Ok(Event::Message(_))) => {
                events.close();
                return Err(LlmError::Stream("event stream skipped its open".to_string()));
            }
            Some(Err(e)) => {
                events.close();
                return Err(connect_error(e).await);
            }
            None => {
                return Err(LlmError::Stream(
                    "event stream closed before opening".to_string(),
                ))
            }
        }

        let state = ReplyState {
            events,
            reply: String::new(),
            commit: Some((user_turn, Arc::clone(&self.history))),
            finished: false,
        };

        Ok(stream::unfold(state, next_fragment).boxed())
    }
}

async fn connect_error(error: reqwest_eventsource::Error) -> LlmError {
    match error {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini API returned {}: {}", status, body);
            LlmError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            }
        }
        reqwest_eventsource::Error::Transport(e) => LlmError::Http(e),
        other => LlmError::Stream(other.to_string()),
    }
}

struct ReplyState {
    events: EventSource,
    reply: String,
    commit: Option<(GeminiContent, Arc<Mutex<Vec<GeminiContent>>>)>,
    finished: bool,
}

impl ReplyState {
    fn fail(mut self, error: LlmError) -> Option<(Result<String, LlmError>, ReplyState)> {
        self.events.close();
        self.finished = true;
        Some((Err(error), self))
    }

    async fn commit(&mut self) {
        if let Some((user_turn, history)) = self.commit.take() {
            let mut history = history.lock().await;
            history.push(user_turn);
            history.push(GeminiContent::text("model", &self.reply));
            debug!(turns = history.len(), "Gemini turn committed");
        }
    }
}

async fn next_fragment(
    mut state: ReplyState,
) -> Option<(Result<String, LlmError>, ReplyState)> {
    if state.finished {
        return None;
    }

    loop {
        match state.events.next().await {
            Some(Ok(Event::Message(message))) => match parse_chunk(&message.data) {
                Ok(Some(text)) => {
                    state.reply.push_str(&text);
                    return Some((Ok(text), state));
                }
                Ok(None) => continue,
                Err(e) => return state.fail(e),
            },
            Some(Ok(Event::Open)) => continue,
            Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => {
                state.events.close();
                state.finished = true;
                state.commit().await;
                return None;
            }
            Some(Err(e)) => return state.fail(LlmError::Stream(e.to_string())),
        }
    }
}

/// Extracts the text of one streamed chunk. `Ok(None)` for chunks that carry
/// no text (usage metadata, finish markers).
fn parse_chunk(payload: &str) -> Result<Option<String>, LlmError> {
    let chunk: GeminiStreamChunk = serde_json::from_str(payload)?;

    if let Some(error) = chunk.error {
        return Err(LlmError::Api {
            status: error.code.unwrap_or(500),
            message: error.message,
        });
    }

    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::Stream(format!("prompt blocked: {reason}")));
    }

    let text: String = chunk
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(text))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<GeminiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// Gemini API types

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![GeminiPart {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    code: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use axum::{
        extract::{Path, RawQuery, State},
        http::{header, HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::get,
        Json, Router,
    };
    use serde_json::{json, Value};

    #[derive(Clone, Default)]
    struct FakeGemini {
        replies: Arc<std::sync::Mutex<VecDeque<Response>>>,
        requests: Arc<std::sync::Mutex<Vec<Value>>>,
    }

    impl FakeGemini {
        fn queue(&self, response: Response) {
            self.replies.lock().unwrap().push_back(response);
        }

        fn requests(&self) -> Vec<Value> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn sse(events: &[Value]) -> Response {
        let body: String = events
            .iter()
            .map(|e| format!("data: {e}\r\n\r\n"))
            .collect();
        ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
    }

    fn text_chunk(text: &str) -> Value {
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
    }

    async fn probe(
        headers: HeaderMap,
        Path(rest): Path<String>,
    ) -> Result<Json<Value>, StatusCode> {
        if headers.get(API_KEY_HEADER).map(|v| v.as_bytes()) != Some(b"good-key") {
            return Err(StatusCode::FORBIDDEN);
        }
        if rest != MODEL {
            return Err(StatusCode::NOT_FOUND);
        }
        Ok(Json(json!({"name": format!("models/{MODEL}")})))
    }

    async fn generate(
        State(fake): State<FakeGemini>,
        Path(rest): Path<String>,
        RawQuery(query): RawQuery,
        Json(body): Json<Value>,
    ) -> Response {
        assert_eq!(rest, format!("{MODEL}:streamGenerateContent"));
        assert_eq!(query.as_deref(), Some("alt=sse"));
        fake.requests.lock().unwrap().push(body);
        fake.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }

    async fn spawn_fake(fake: FakeGemini) -> String {
        let app = Router::new()
            .route("/v1beta/models/*rest", get(probe).post(generate))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn provider(base_url: &str, key: &str) -> GeminiProvider {
        GeminiProvider::new(key.to_string(), base_url, Duration::from_secs(5)).unwrap()
    }

    async fn collect(stream: FragmentStream) -> Vec<Result<String, LlmError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_open_with_empty_key_is_rejected_locally() {
        let err = provider("http://127.0.0.1:9", " ").open().await.err().unwrap();
        assert!(matches!(err, LlmError::Config(_)));
    }

    #[tokio::test]
    async fn test_open_with_rejected_key_fails() {
        let base = spawn_fake(FakeGemini::default()).await;
        let err = provider(&base, "bad-key").open().await.err().unwrap();
        assert!(matches!(err, LlmError::Api { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_open_unreachable_provider_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = provider(&format!("http://{addr}"), "good-key")
            .open()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LlmError::Http(_)));
    }

    #[tokio::test]
    async fn test_send_streams_fragments_in_order() {
        let fake = FakeGemini::default();
        fake.queue(sse(&[
            text_chunk("Hello"),
            text_chunk(", "),
            json!({"usageMetadata": {"totalTokenCount": 3}}),
            text_chunk("Ana!"),
        ]));
        let base = spawn_fake(fake.clone()).await;

        let chat = provider(&base, "good-key").open().await.unwrap();
        let fragments: Vec<String> = collect(chat.send("hi").await.unwrap())
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(fragments, vec!["Hello", ", ", "Ana!"]);
        assert_eq!(fragments.concat(), "Hello, Ana!");
        assert_eq!(fake.requests()[0]["contents"][0]["parts"][0]["text"], "hi");
    }

    #[tokio::test]
    async fn test_ended_stream_is_not_reconnected() {
        let fake = FakeGemini::default();
        fake.queue(sse(&[text_chunk("Done.")]));
        let base = spawn_fake(fake.clone()).await;

        let chat = provider(&base, "good-key").open().await.unwrap();
        let items = collect(chat.send("hi").await.unwrap()).await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_deref().unwrap(), "Done.");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_carries_committed_history() {
        let fake = FakeGemini::default();
        fake.queue(sse(&[text_chunk("Plan ready.")]));
        fake.queue(sse(&[text_chunk("Sure.")]));
        let base = spawn_fake(fake.clone()).await;

        let chat = provider(&base, "good-key").open().await.unwrap();
        collect(chat.send("initial prompt").await.unwrap()).await;
        collect(chat.send("follow up").await.unwrap()).await;

        let contents = fake.requests()[1]["contents"].as_array().unwrap().clone();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["text"], "Plan ready.");
        assert_eq!(contents[2]["parts"][0]["text"], "follow up");
    }

    #[tokio::test]
    async fn test_failed_turn_is_not_committed() {
        let fake = FakeGemini::default();
        fake.queue(sse(&[
            text_chunk("partial"),
            json!({"error": {"code": 503, "message": "overloaded"}}),
        ]));
        fake.queue(sse(&[text_chunk("ok")]));
        let base = spawn_fake(fake.clone()).await;

        let chat = provider(&base, "good-key").open().await.unwrap();
        let items = collect(chat.send("first").await.unwrap()).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "partial");
        assert!(matches!(items[1], Err(LlmError::Api { status: 503, .. })));

        collect(chat.send("second").await.unwrap()).await;
        let contents = fake.requests()[1]["contents"].as_array().unwrap().clone();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["parts"][0]["text"], "second");
    }

    #[tokio::test]
    async fn test_send_non_success_status_is_error() {
        let fake = FakeGemini::default();
        fake.queue(
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"error": {"code": 429, "message": "quota exhausted"}})),
            )
                .into_response(),
        );
        let base = spawn_fake(fake.clone()).await;

        let chat = provider(&base, "good-key").open().await.unwrap();
        match chat.send("hi").await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "quota exhausted");
            }
            other => panic!("expected API error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_parse_chunk_blocked_prompt() {
        let payload = json!({"promptFeedback": {"blockReason": "SAFETY"}}).to_string();
        assert!(matches!(parse_chunk(&payload), Err(LlmError::Stream(_))));
    }

    #[test]
    fn test_parse_chunk_joins_parts() {
        let payload = json!({"candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}]})
            .to_string();
        assert_eq!(parse_chunk(&payload).unwrap().as_deref(), Some("ab"));
    }

    #[test]
    fn test_parse_chunk_without_text_is_none() {
        let payload = json!({"candidates": [{"finishReason": "STOP"}]}).to_string();
        assert_eq!(parse_chunk(&payload).unwrap(), None);
    }

    #[test]
    fn test_error_message_falls_back_to_raw_body() {
        assert_eq!(error_message("gateway down"), "gateway down");
    }
}
