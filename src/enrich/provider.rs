use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Single-shot text-completion provider
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Issue one completion request and return the raw response text
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Chat-completions HTTP adapter
pub struct OpenAiCompletions {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
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
    content: String,
}

impl OpenAiCompletions {
    /// Reads the API key from the environment. A missing key fails service
    /// construction, so no session can start without credentials.
    pub fn new(base_url: String, model: String, api_key_env: &str) -> Result<Self> {
        let api_key = std::env::var(api_key_env)
            .with_context(|| format!("completion API key not set in ${api_key_env}"))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        })
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAiCompletions {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
            "temperature": 0.7,
            "max_tokens": 500,
        });

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("completion request failed")?
            .error_for_status()
            .context("completion request rejected")?;

        let parsed: ChatResponse = response
            .json()
            .await
            .context("completion response was not valid JSON")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("completion response had no choices")?;

        debug!(chars = content.len(), "completion received");
        Ok(content)
    }
}
