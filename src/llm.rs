//! Language-model collaborator interface and HTTP adapter.
//!
//! The pipeline only ever needs one operation from the model: turn a text
//! prompt into a text completion. Everything schema-shaped (synthesis JSON)
//! is parsed and validated by the caller, which keeps this seam small enough
//! to mock in tests.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Errors from the language-model collaborator.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transport-level failure (timeout, connection reset). Eligible for a
    /// single bounded retry.
    #[error("LLM transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("LLM API error: status {0}")]
    Status(u16),

    /// The response body could not be interpreted.
    #[error("LLM malformed response: {0}")]
    Malformed(String),
}

impl LlmError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_)) || matches!(self, Self::Status(s) if *s >= 500 || *s == 429)
    }
}

/// A language-model collaborator accepting a text prompt.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for the given prompt.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Human-readable provider name for logs.
    fn name(&self) -> &str;
}

/// HTTP adapter for OpenAI-compatible chat-completions APIs.
pub struct HttpLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl HttpLlmProvider {
    /// Create an adapter for an OpenAI-compatible endpoint.
    ///
    /// `api_url` is the full chat-completions URL, e.g.
    /// `https://api.openai.com/v1/chat/completions`.
    pub fn new(client: reqwest::Client, api_url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
            model,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.2,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Status(status.as_u16()));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Malformed("response contained no choices".into()))?;

        tracing::trace!(chars = content.len(), "LLM completion received");
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Call the provider once, retrying a single time on a transient failure.
///
/// This is the only retry policy the pipeline applies to the model; schema
/// failures are handled by falling back, never by re-prompting.
pub async fn complete_with_retry(
    provider: &dyn LlmProvider,
    prompt: &str,
) -> Result<String, LlmError> {
    match provider.complete(prompt).await {
        Ok(text) => Ok(text),
        Err(err) if err.is_transient() => {
            tracing::debug!(provider = provider.name(), error = %err, "retrying LLM call once");
            provider.complete(prompt).await
        }
        Err(err) => Err(err),
    }
}
