use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

mod openai;

pub use openai::OpenAiCompatibleClient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("DEEPSEEK_API_KEY is not configured")]
    MissingApiKey,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("token receiver dropped")]
    Cancelled,
}

/// A chat model that answers a single user prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Streams content deltas into `tokens` and returns the full text.
    async fn stream(&self, prompt: &str, tokens: mpsc::Sender<String>)
        -> Result<String, LlmError>;
}
