//! Chat model abstraction and implementations.
//!
//! Both the query rewriter and the answer synthesizer talk to a language
//! model through [`ChatModel`]: a list of role-tagged messages in, one
//! generated string out.
//!
//! | `llm.provider` | Implementation | Default URL |
//! |----------------|----------------|-------------|
//! | `"groq"` | [`OpenAIChat`] | `https://api.groq.com/openai/v1` |
//! | `"openai"` | [`OpenAIChat`] | `https://api.openai.com/v1` |
//! | `"ollama"` | [`OllamaChat`] | `http://localhost:11434` |

use anyhow::{bail, Result};
use async_trait::async_trait;
use docchat_core::models::{Role, Turn};
use serde::Serialize;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::http;

const GROQ_DEFAULT_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        let role = match turn.role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        };
        Self {
            role,
            content: turn.content.clone(),
        }
    }
}

/// A language model that completes a conversation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
    /// Generate the next assistant message for `messages`.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

// ============ OpenAI-compatible (Groq, OpenAI, vLLM, ...) ============

/// Chat model for `POST {url}/chat/completions`.
pub struct OpenAIChat {
    service: &'static str,
    model: String,
    url: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    /// Build from config. `service` is `"groq"` or `"openai"` and picks the
    /// default base URL.
    pub fn new(config: &LlmConfig, service: &'static str) -> Result<Self> {
        let default_url = match service {
            "groq" => GROQ_DEFAULT_URL,
            _ => OPENAI_DEFAULT_URL,
        };
        let url = config.url.clone().unwrap_or_else(|| default_url.to_string());
        let api_key = http::api_key_from_env(&config.api_key_env);
        if api_key.is_none() && url == default_url {
            bail!(
                "{} environment variable not set (required by the {} provider)",
                config.api_key_env,
                service
            );
        }

        Ok(Self {
            service,
            model: config.model.clone(),
            url: url.trim_end_matches('/').to_string(),
            api_key,
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }

        let json = http::post_json(
            &self.client,
            &format!("{}/chat/completions", self.url),
            self.api_key.as_deref(),
            &body,
            self.max_retries,
            self.service,
        )
        .await?;
        parse_openai_chat(&json)
    }
}

fn parse_openai_chat(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|c| c.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))
}

// ============ Ollama ============

/// Chat model for a local Ollama instance (`POST {url}/api/chat`).
pub struct OllamaChat {
    model: String,
    url: String,
    temperature: Option<f32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());
        Ok(Self {
            model: config.model.clone(),
            url: url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["options"] = serde_json::json!({ "temperature": t });
        }

        let json = http::post_json(
            &self.client,
            &format!("{}/api/chat", self.url),
            None,
            &body,
            self.max_retries,
            "ollama",
        )
        .await?;
        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(|c| c.to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama chat response: missing message.content"))
    }
}

/// Create the [`ChatModel`] selected by `llm.provider`.
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "groq" => Ok(Arc::new(OpenAIChat::new(config, "groq")?)),
        "openai" => Ok(Arc::new(OpenAIChat::new(config, "openai")?)),
        "ollama" => Ok(Arc::new(OllamaChat::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
