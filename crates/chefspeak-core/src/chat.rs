//! OpenAI-compatible chat completion client.
//!
//! The reply text (`choices[0].message.content`) is the only thing callers get back;
//! step extraction happens in [`crate::steps`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ChatSettings;
use crate::error::{CoreError, CoreResult};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Failures of a single chat completion call.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Transport(String),

    #[error("chat API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("chat response could not be decoded: {0}")]
    Decode(String),

    #[error("chat response contained no message")]
    EmptyReply,
}

/// One message of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// A chat completion endpoint. Implement for any provider; tests use in-memory fakes.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send `messages` and return the text of the first choice.
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, ChatError>;
}

/// Chat completion over HTTP with bearer-token auth (OpenAI, OpenRouter, local gateways).
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    api_base: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    /// Create a client for the default endpoint and model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into().trim().to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: build_client(Duration::from_secs(60)),
        }
    }

    /// Build from settings. Fails when no API key is configured.
    pub fn from_settings(settings: &ChatSettings) -> CoreResult<Self> {
        let api_key = settings.resolved_api_key().ok_or(CoreError::MissingApiKey)?;
        Ok(Self {
            api_base: settings.api_base.clone(),
            api_key,
            model: settings.model.clone(),
            client: build_client(Duration::from_secs(settings.timeout_secs.max(1))),
        })
    }

    /// Base URL without the `/chat/completions` suffix (e.g. `https://api.openai.com/v1`).
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[async_trait]
impl ChatCompletion for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, ChatError> {
        let url = self.endpoint();
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature,
        };
        debug!(model = %self.model, messages = messages.len(), "sending chat completion");

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            warn!(status, "chat completion rejected");
            return Err(ChatError::Status { status, body });
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ChatError::EmptyReply)
    }
}
