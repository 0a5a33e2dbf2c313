/// LLM Client: the single point of entry for all model calls in OptiLife.
///
/// ARCHITECTURAL RULE: No other module may call the model provider directly.
/// Sessions talk to the provider only through `ChatProvider` / `ChatSession`.
///
/// Model: gemini-2.5-flash (hardcoded, not configurable)
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub mod gemini;
#[cfg(test)]
pub mod testing;

/// The model used for every plan session.
pub const MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Provider configuration rejected: {0}")]
    Config(String),

    #[error("Timed out after {0}s waiting for the provider")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Ordered text fragments of one reply. Finite, and not restartable once consumed.
/// Concatenating every `Ok` item yields the full reply.
pub type FragmentStream = BoxStream<'static, Result<String, LlmError>>;

/// Opens conversational sessions against the model provider.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Establishes one persistent conversation bound to `MODEL`.
    async fn open(&self) -> Result<Box<dyn ChatSession>, LlmError>;
}

/// One open conversation. The provider keeps the turn history.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Sends a user turn and returns the streamed reply.
    ///
    /// Resolves once the provider has accepted the request; fragments arrive
    /// through the returned stream.
    async fn send(&self, text: &str) -> Result<FragmentStream, LlmError>;
}
