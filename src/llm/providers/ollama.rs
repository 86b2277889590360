use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{BridgeError, BridgeResult, ModelError, ModelResult};
use crate::imaging;
use crate::llm::normalize::{self, EmptyContentPolicy};
use crate::llm::provider::VisionModel;
use crate::llm::types::ProviderConfig;

/// A `thinking` trace is never used in place of an empty answer.
pub const EMPTY_CONTENT_POLICY: EmptyContentPolicy = EmptyContentPolicy::RefuseSecondary;

pub const DEFAULT_HOST: &str = "http://localhost:11434";

const SYSTEM_PROMPT: &str = "You are a UI automation assistant. Answer directly in exactly the \
format the user asks for. Do not write out your reasoning process, thinking steps or any \
text outside the requested fields.";

/// Decoding parameters sent as Ollama `options`.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaOptions {
    pub temperature: f32,
    pub num_predict: u32,
    pub num_ctx: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl OllamaOptions {
    pub fn from_config(cfg: &ProviderConfig) -> Self {
        Self {
            temperature: cfg.temperature,
            num_predict: cfg.max_tokens,
            num_ctx: 8192,
            top_p: 0.9,
            repeat_penalty: 1.1,
        }
    }
}

/// One chat message. Images are file paths; [`OllamaClient`] embeds them.
#[derive(Debug, Clone)]
pub struct OllamaMessage {
    pub role: String,
    pub content: String,
    pub images: Vec<PathBuf>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct OllamaChatResponse {
    #[serde(default)]
    pub message: Option<OllamaReply>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OllamaReply {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub thinking: Option<String>,
}

/// Minimal client for the daemon's native `/api/chat` call.
#[derive(Clone)]
pub struct OllamaClient {
    host: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>, timeout: std::time::Duration) -> BridgeResult<Self> {
        Ok(Self {
            host: host.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Non-streaming chat call.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[OllamaMessage],
        options: &OllamaOptions,
    ) -> BridgeResult<OllamaChatResponse> {
        let mut wire = Vec::with_capacity(messages.len());
        for msg in messages {
            let mut images = Vec::with_capacity(msg.images.len());
            for path in &msg.images {
                images.push(imaging::encode_base64(path).await?);
            }
            wire.push(WireMessage {
                role: &msg.role,
                content: &msg.content,
                images,
            });
        }

        let body = serde_json::json!({
            "model": model,
            "messages": wire,
            "stream": false,
            "options": options,
        });
        tracing::debug!(body = %normalize::sanitize_for_log(&body), "ollama request");

        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        let parsed: OllamaChatResponse = serde_json::from_str(&text).map_err(|e| {
            BridgeError::Backend(format!("unexpected ollama response ({status}): {e}: {text}"))
        })?;
        if let Some(err) = &parsed.error {
            return Err(BridgeError::Backend(format!("ollama error ({status}): {err}")));
        }
        Ok(parsed)
    }
}

pub struct OllamaProvider {
    id: String,
    model: String,
    options: OllamaOptions,
    client: OllamaClient,
}

impl OllamaProvider {
    pub fn new(id: impl Into<String>, cfg: ProviderConfig) -> BridgeResult<Self> {
        cfg.validate()?;
        let host = cfg.base_url.clone().unwrap_or_else(|| DEFAULT_HOST.to_string());
        let client = OllamaClient::new(host, cfg.timeout)?;
        Ok(Self {
            id: id.into(),
            options: OllamaOptions::from_config(&cfg),
            model: cfg.model,
            client,
        })
    }

    pub fn with_options(mut self, options: OllamaOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl VisionModel for OllamaProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn get_response(&self, prompt: &str, images: &[PathBuf]) -> ModelResult {
        let messages = [
            OllamaMessage {
                role: "system".into(),
                content: SYSTEM_PROMPT.into(),
                images: Vec::new(),
            },
            OllamaMessage {
                role: "user".into(),
                content: prompt.to_string(),
                images: images.to_vec(),
            },
        ];

        tracing::debug!(provider = %self.id, model = %self.model, images = images.len(), "sending ollama chat");
        let response = self
            .client
            .chat(&self.model, &messages, &self.options)
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.id, error = %e, "ollama call failed");
                ModelError::AdapterError(e.to_string())
            })?;

        let Some(reply) = response.message else {
            tracing::error!(provider = %self.id, "ollama response has no message");
            return Err(ModelError::AdapterError("response has no message".into()));
        };
        normalize::resolve_content(
            &self.id,
            Some(&reply.content),
            reply.thinking.as_deref(),
            EMPTY_CONTENT_POLICY,
        )
    }
}
