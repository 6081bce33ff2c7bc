//! Chat-completion capability and an OpenAI-compatible HTTP client for it (Groq by default).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Remote chat completion: ordered turns in, candidate completions out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the text of every choice, in the order the service sent them.
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<Vec<String>, CompletionError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct GroqClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for GroqClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GroqClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or(CompletionError::MissingApiKey)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CompletionError::Request)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for GroqClient {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<Vec<String>, CompletionError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&ChatRequest { model, messages })
            .send()
            .await
            .map_err(CompletionError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(CompletionError::from_reqwest)?;
        choice_texts(parsed)
    }
}

/// Choice texts in order. A first choice without content is an error; it is
/// never passed on as an empty answer.
fn choice_texts(response: ChatResponse) -> Result<Vec<String>, CompletionError> {
    let mut choices = response.choices.into_iter().map(|c| c.message.content);
    let first = match choices.next() {
        None => return Ok(Vec::new()),
        Some(None) => return Err(CompletionError::EmptyContent),
        Some(Some(text)) => text,
    };
    Ok(std::iter::once(first)
        .chain(choices.map(Option::unwrap_or_default))
        .collect())
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion service API key is not set (API_KEY)")]
    MissingApiKey,
    #[error("completion request timed out")]
    Timeout,
    #[error("completion request failed: {0}")]
    Request(reqwest::Error),
    #[error("completion service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion service returned no choices")]
    NoChoices,
    #[error("completion service returned a choice without content")]
    EmptyContent,
    #[error("completion failed: {0}")]
    Other(String),
}

impl CompletionError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CompletionError::Timeout
        } else {
            CompletionError::Request(e)
        }
    }
}
