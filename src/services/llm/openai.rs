use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::{ChatModel, LlmError};
use crate::config::LlmSettings;
use crate::sse::SseDecoder;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for DeepSeek and other OpenAI-compatible endpoints.
pub struct OpenAiCompatibleClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatibleClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.api_key.as_deref().ok_or(LlmError::MissingApiKey)
    }

    fn build_request_body(&self, prompt: &str, stream: bool) -> Value {
        json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": stream,
        })
    }
}

/// Extracts the content delta from one upstream `data:` payload.
fn parse_delta(data: &str) -> Option<String> {
    let chunk: StreamChunk = serde_json::from_str(data).ok()?;
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
}

#[async_trait]
impl ChatModel for OpenAiCompatibleClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self.api_key()?;
        let url = self.endpoint();
        let body = self.build_request_body(prompt, false);

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                log::warn!(
                    "LLM request retry {} after {}ms: {:?}",
                    attempt,
                    backoff,
                    last_error
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match self
                .http
                .post(&url)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();
            if is_retryable_status(status) && attempt < MAX_RETRIES {
                let message = response.text().await.unwrap_or_default();
                last_error = Some(LlmError::Api { status, message });
                continue;
            }

            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(LlmError::RateLimited {
                    retry_after: Duration::from_secs(retry_after),
                });
            }

            if !response.status().is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(LlmError::Api { status, message });
            }

            let parsed: ChatResponse = response.json().await?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;
            log::info!("LLM completion finished ({} chars)", content.chars().count());
            return Ok(content);
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::InvalidResponse("max retries exceeded".to_string())))
    }

    async fn stream(
        &self,
        prompt: &str,
        tokens: mpsc::Sender<String>,
    ) -> Result<String, LlmError> {
        let api_key = self.api_key()?;
        let body = self.build_request_body(prompt, true);

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut full_text = String::new();

        'read: while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for frame in decoder.push(&chunk) {
                if frame.data.trim() == "[DONE]" {
                    break 'read;
                }
                if let Some(delta) = parse_delta(&frame.data) {
                    full_text.push_str(&delta);
                    if tokens.send(delta).await.is_err() {
                        return Err(LlmError::Cancelled);
                    }
                }
            }
        }

        log::info!("LLM stream finished ({} chars)", full_text.chars().count());
        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: Option<&str>) -> LlmSettings {
        LlmSettings {
            api_key: api_key.map(str::to_string),
            base_url: "https://api.deepseek.com/v1/".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.7,
            max_tokens: 6000,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_request_body() {
        let client = OpenAiCompatibleClient::new(&settings(Some("sk-test"))).unwrap();
        assert_eq!(client.endpoint(), "https://api.deepseek.com/v1/chat/completions");

        let body = client.build_request_body("plan a trip", true);
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "plan a trip");
        assert_eq!(body["max_tokens"], 6000);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_parse_delta() {
        let data = r#"{"choices":[{"delta":{"content":"{\"day_1\""}}]}"#;
        assert_eq!(parse_delta(data).as_deref(), Some("{\"day_1\""));
        assert_eq!(parse_delta(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#), None);
        assert_eq!(parse_delta(r#"{"choices":[{"delta":{"content":""}}]}"#), None);
        assert_eq!(parse_delta("not json"), None);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
    }

    #[actix_rt::test]
    async fn test_missing_key_fails_before_network() {
        let client = OpenAiCompatibleClient::new(&settings(None)).unwrap();
        let (tx, _rx) = mpsc::channel(4);
        assert!(matches!(
            client.stream("hello", tx).await,
            Err(LlmError::MissingApiKey)
        ));
        assert!(matches!(
            client.complete("hello").await,
            Err(LlmError::MissingApiKey)
        ));
    }
}
