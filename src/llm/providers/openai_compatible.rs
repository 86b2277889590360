use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{BridgeResult, ModelError, ModelResult};
use crate::imaging::{self, ImagePreparer};
use crate::llm::normalize::{self, EmptyContentPolicy};
use crate::llm::provider::VisionModel;
use crate::llm::types::{ChatMessage, ContentPart, ImageUrl, ProviderConfig};
use crate::monitor::{ElapsedProbe, ResourceProbe};
use crate::sidecar::ImageServer;

/// Empty `content` falls back to a non-empty `reasoning` field.
pub const EMPTY_CONTENT_POLICY: EmptyContentPolicy = EmptyContentPolicy::SubstituteSecondary;

/// How image files are referenced in the request.
#[derive(Clone)]
pub enum ImageTransport {
    /// Prepared, then embedded as `data:image/jpeg;base64,...`.
    Inline(ImagePreparer),
    /// Served by the local image server and referenced by URL.
    Served(Arc<ImageServer>),
}

pub struct OpenAiCompatibleProvider {
    id: String,
    endpoint: String,
    cfg: ProviderConfig,
    transport: ImageTransport,
    probe: Arc<dyn ResourceProbe>,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// `cfg.base_url` is the full chat-completions endpoint.
    pub fn new(id: impl Into<String>, cfg: ProviderConfig, transport: ImageTransport) -> BridgeResult<Self> {
        cfg.validate()?;
        let endpoint = cfg.base_url.clone().ok_or_else(|| {
            crate::errors::BridgeError::Config("OpenAI-compatible backend needs api_base".into())
        })?;
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            id: id.into(),
            endpoint,
            cfg,
            transport,
            probe: Arc::new(ElapsedProbe),
            client,
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn ResourceProbe>) -> Self {
        self.probe = probe;
        self
    }
}

#[async_trait]
impl VisionModel for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn get_response(&self, prompt: &str, images: &[PathBuf]) -> ModelResult {
        let mut probe = self.probe.start();

        let parts = user_parts(prompt, images, &self.transport).await.map_err(|e| {
            tracing::error!(provider = %self.id, error = %e, "failed to attach images");
            e
        })?;

        let body = serde_json::json!({
            "model": self.cfg.model,
            "messages": [ChatMessage::user(parts)],
            "temperature": self.cfg.temperature,
            "max_tokens": self.cfg.max_tokens,
        });

        tracing::debug!(
            provider = %self.id,
            model = %self.cfg.model,
            images = images.len(),
            "sending chat completion request"
        );
        tracing::debug!(body = %normalize::sanitize_for_log(&body), "request body (sanitized)");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let err = normalize::classify_transport(&e, self.cfg.timeout);
                tracing::error!(provider = %self.id, error = %e, "request failed");
                err
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            tracing::error!(provider = %self.id, error = %e, "failed to read response body");
            normalize::classify_transport(&e, self.cfg.timeout)
        })?;
        let json: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(
                provider = %self.id,
                status = %status,
                body = %String::from_utf8_lossy(&bytes),
                "response is not JSON"
            );
            ModelError::ParseError(e.to_string())
        })?;

        probe.stop();
        let content = interpret_chat_completion(&self.id, &json, EMPTY_CONTENT_POLICY)?;

        log_usage(&self.id, &json);
        tracing::info!(provider = %self.id, "{}", probe.summarize());
        Ok(content)
    }
}

/// Text part followed by one image part per file, in order.
pub(crate) async fn user_parts(
    prompt: &str,
    images: &[PathBuf],
    transport: &ImageTransport,
) -> Result<Vec<ContentPart>, ModelError> {
    let mut parts = Vec::with_capacity(images.len() + 1);
    parts.push(ContentPart::Text {
        text: prompt.to_string(),
    });
    for img in images {
        let url = match transport {
            ImageTransport::Inline(preparer) => {
                let prepared = imaging::prepare_blocking(preparer, img)
                    .await
                    .map_err(|e| ModelError::AdapterError(e.to_string()))?;
                let b64 = imaging::encode_base64(&prepared)
                    .await
                    .map_err(|e| ModelError::AdapterError(e.to_string()))?;
                format!("data:image/jpeg;base64,{b64}")
            }
            ImageTransport::Served(server) => server
                .url_for(img)
                .await
                .map_err(|e| ModelError::AdapterError(e.to_string()))?,
        };
        parts.push(ContentPart::ImageUrl {
            image_url: ImageUrl { url },
        });
    }
    Ok(parts)
}

/// Extract the answer from a chat-completion JSON payload.
pub(crate) fn interpret_chat_completion(
    provider: &str,
    json: &serde_json::Value,
    policy: EmptyContentPolicy,
) -> ModelResult {
    if let Some(err) = json.get("error").filter(|e| !e.is_null()) {
        let message = err["message"]
            .as_str()
            .map(str::to_string)
            .or_else(|| err.as_str().map(str::to_string))
            .unwrap_or_else(|| err.to_string());
        tracing::error!(provider, message = %message, "provider reported an error");
        return Err(ModelError::ProviderError(message));
    }

    let Some(first) = json["choices"].as_array().and_then(|c| c.first()) else {
        tracing::error!(provider, response = %json, "no 'choices' in model response");
        return Err(ModelError::MalformedResponse("missing 'choices'".into()));
    };

    let message = &first["message"];
    let reasoning = message["reasoning"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| message["reasoning_content"].as_str());

    normalize::resolve_content(provider, message["content"].as_str(), reasoning, policy).map_err(|e| {
        tracing::warn!(provider, response = %json, "full response");
        e
    })
}

pub(crate) fn log_usage(provider: &str, json: &serde_json::Value) {
    let usage = &json["usage"];
    if usage.is_null() {
        return;
    }
    let prompt_tokens = usage["prompt_tokens"].as_u64().unwrap_or(0);
    let completion_tokens = usage["completion_tokens"].as_u64().unwrap_or(0);
    tracing::info!(
        provider,
        prompt_tokens,
        completion_tokens,
        "Request cost is ${:.2}",
        normalize::estimate_cost(prompt_tokens, completion_tokens)
    );
}
