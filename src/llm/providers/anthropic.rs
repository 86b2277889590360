use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{BridgeResult, ModelError, ModelResult};
use crate::imaging::{self, ImagePreparer};
use crate::llm::normalize::{self, EmptyContentPolicy};
use crate::llm::provider::VisionModel;
use crate::llm::types::ProviderConfig;

/// Only `text` blocks form the answer; there is no fallback field.
pub const EMPTY_CONTENT_POLICY: EmptyContentPolicy = EmptyContentPolicy::PrimaryOnly;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<RequestMessage>,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: &'static str,
    content: Vec<RequestBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

pub struct AnthropicProvider {
    id: String,
    endpoint: String,
    cfg: ProviderConfig,
    preparer: ImagePreparer,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(id: impl Into<String>, cfg: ProviderConfig, preparer: ImagePreparer) -> BridgeResult<Self> {
        cfg.validate()?;
        let base = cfg
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            id: id.into(),
            endpoint: format!("{}/v1/messages", base.trim_end_matches('/')),
            cfg,
            preparer,
            client,
        })
    }

    /// Image blocks first, then the prompt.
    async fn content_blocks(&self, prompt: &str, images: &[PathBuf]) -> BridgeResult<Vec<RequestBlock>> {
        let mut blocks = Vec::with_capacity(images.len() + 1);
        for img in images {
            let prepared = imaging::prepare_blocking(&self.preparer, img).await?;
            blocks.push(RequestBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: imaging::media_type(&prepared),
                    data: imaging::encode_base64(&prepared).await?,
                },
            });
        }
        blocks.push(RequestBlock::Text {
            text: prompt.to_string(),
        });
        Ok(blocks)
    }
}

#[async_trait]
impl VisionModel for AnthropicProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn get_response(&self, prompt: &str, images: &[PathBuf]) -> ModelResult {
        let content = self.content_blocks(prompt, images).await.map_err(|e| {
            tracing::error!(provider = %self.id, error = %e, "failed to attach images");
            ModelError::AdapterError(e.to_string())
        })?;

        let request = MessagesRequest {
            model: &self.cfg.model,
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
            messages: vec![RequestMessage {
                role: "user",
                content,
            }],
        };
        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(body) = serde_json::to_value(&request) {
                tracing::debug!(body = %normalize::sanitize_for_log(&body), "messages request");
            }
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.cfg.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.id, error = %e, "request failed");
                normalize::classify_transport(&e, self.cfg.timeout)
            })?;

        let json: serde_json::Value = response.json().await.map_err(|e| {
            tracing::error!(provider = %self.id, error = %e, "failed to decode response");
            normalize::classify_transport(&e, self.cfg.timeout)
        })?;

        if let Some(err) = json.get("error").filter(|e| !e.is_null()) {
            let message = err["message"].as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
            tracing::error!(provider = %self.id, message = %message, "provider reported an error");
            return Err(ModelError::ProviderError(message));
        }

        let parsed: MessagesResponse = serde_json::from_value(json.clone()).map_err(|e| {
            tracing::error!(provider = %self.id, response = %json, "unexpected response shape");
            ModelError::MalformedResponse(e.to_string())
        })?;

        let text = collect_text(&self.id, parsed.content);
        let answer = normalize::resolve_content(&self.id, Some(&text), None, EMPTY_CONTENT_POLICY)?;

        if let Some(usage) = parsed.usage {
            tracing::info!(
                provider = %self.id,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "token usage"
            );
        }
        Ok(answer)
    }
}

/// Concatenate `text` blocks in order; `thinking` blocks are only logged.
fn collect_text(provider: &str, blocks: Vec<ResponseBlock>) -> String {
    let mut text = String::new();
    for block in blocks {
        match block {
            ResponseBlock::Text { text: t } => text.push_str(&t),
            ResponseBlock::Thinking { thinking } => {
                tracing::debug!(provider, len = thinking.len(), thinking = %thinking, "thinking block");
            }
            ResponseBlock::Unknown => {}
        }
    }
    text
}
