//! Multi-provider gateway adapter.
//!
//! Model names follow the `provider/model` convention (`groq/llava-v1.5-7b`,
//! `gemini/gemini-1.5-pro`). With a configured `base_url` the adapter talks to a
//! gateway proxy and forwards the full name; otherwise the prefix selects one
//! of the OpenAI-compatible endpoints in [`ROUTES`].

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::{BridgeResult, ModelError, ModelResult};
use crate::imaging::ImagePreparer;
use crate::llm::normalize::{self, EmptyContentPolicy};
use crate::llm::provider::VisionModel;
use crate::llm::providers::openai_compatible::{
    interpret_chat_completion, log_usage, user_parts, ImageTransport,
};
use crate::llm::types::{ChatMessage, ProviderConfig};

pub const EMPTY_CONTENT_POLICY: EmptyContentPolicy = EmptyContentPolicy::SubstituteSecondary;

/// Prefix → OpenAI-compatible base URL. Unprefixed names use `openai`.
pub const ROUTES: &[(&str, &str)] = &[
    ("openai", "https://api.openai.com/v1"),
    ("openrouter", "https://openrouter.ai/api/v1"),
    ("groq", "https://api.groq.com/openai/v1"),
    ("deepseek", "https://api.deepseek.com/v1"),
    ("together_ai", "https://api.together.xyz/v1"),
    ("mistral", "https://api.mistral.ai/v1"),
    ("gemini", "https://generativelanguage.googleapis.com/v1beta/openai"),
    ("anthropic", "https://api.anthropic.com/v1"),
    ("ollama", "http://localhost:11434/v1"),
    ("xai", "https://api.x.ai/v1"),
];

/// Human-readable provider name for logs. Never used for routing.
pub fn provider_label(model: &str) -> &'static str {
    let Some((prefix, _)) = model.split_once('/') else {
        return "OpenAI";
    };
    match prefix {
        "openai" => "OpenAI",
        "openrouter" => "OpenRouter",
        "groq" => "Groq",
        "deepseek" => "DeepSeek",
        "together_ai" => "Together AI",
        "mistral" => "Mistral AI",
        "gemini" | "vertex_ai" => "Google Gemini",
        "anthropic" => "Anthropic (Claude)",
        "ollama" => "Ollama (local)",
        "xai" => "xAI",
        "azure" => "Azure OpenAI",
        "bedrock" => "AWS Bedrock",
        _ => "Unknown provider",
    }
}

/// Resolved destination of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub endpoint: String,
    /// Model name as the destination expects it.
    pub model: String,
}

/// Resolve where `model` is sent. `proxy` short-circuits the route table.
pub fn resolve_route(model: &str, proxy: Option<&str>) -> Result<Route, ModelError> {
    if let Some(base) = proxy {
        return Ok(Route {
            endpoint: chat_endpoint(base),
            model: model.to_string(),
        });
    }

    let (prefix, rest) = model.split_once('/').unwrap_or(("openai", model));
    ROUTES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, base)| Route {
            endpoint: chat_endpoint(base),
            model: rest.to_string(),
        })
        .ok_or_else(|| {
            ModelError::AdapterError(format!("no route for provider prefix '{prefix}' in model '{model}'"))
        })
}

fn chat_endpoint(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}

pub struct GatewayProvider {
    id: String,
    cfg: ProviderConfig,
    transport: ImageTransport,
    client: reqwest::Client,
}

impl GatewayProvider {
    pub fn new(id: impl Into<String>, cfg: ProviderConfig, preparer: ImagePreparer) -> BridgeResult<Self> {
        cfg.validate()?;
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            id: id.into(),
            cfg,
            transport: ImageTransport::Inline(preparer),
            client,
        })
    }

    fn fail(&self, err: ModelError) -> ModelError {
        tracing::error!(provider = %self.id, model = %self.cfg.model, error = %err, "gateway call failed");
        err
    }
}

#[async_trait]
impl VisionModel for GatewayProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn get_response(&self, prompt: &str, images: &[PathBuf]) -> ModelResult {
        let label = provider_label(&self.cfg.model);
        tracing::info!(provider = label, model = %self.cfg.model, "using provider");

        let route = resolve_route(&self.cfg.model, self.cfg.base_url.as_deref()).map_err(|e| self.fail(e))?;
        let parts = user_parts(prompt, images, &self.transport)
            .await
            .map_err(|e| self.fail(e))?;

        let body = serde_json::json!({
            "model": route.model,
            "messages": [ChatMessage::user(parts)],
            "temperature": self.cfg.temperature,
            "max_tokens": self.cfg.max_tokens,
        });
        tracing::debug!(endpoint = %route.endpoint, body = %normalize::sanitize_for_log(&body), "gateway request");

        let response = self
            .client
            .post(&route.endpoint)
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.fail(classify_reqwest(e, &self.cfg)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.fail(classify_reqwest(e, &self.cfg)))?;
        let parsed = serde_json::from_slice::<serde_json::Value>(&bytes);

        if !status.is_success() {
            let detail = match &parsed {
                Ok(json) => json["error"]["message"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| json.to_string()),
                Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
            };
            return Err(self.fail(normalize::classify_status(
                status.as_u16(),
                &format!("{status}: {detail}"),
            )));
        }

        let json = parsed.map_err(|e| self.fail(ModelError::ParseError(e.to_string())))?;
        let content = match interpret_chat_completion(&self.id, &json, EMPTY_CONTENT_POLICY) {
            Ok(content) => content,
            Err(ModelError::ProviderError(message)) => {
                return Err(self.fail(normalize::classify_message(&message)))
            }
            Err(e) => return Err(e),
        };

        log_usage(&self.id, &json);
        Ok(content)
    }
}

/// The request URL is dropped before classifying so its host and port never
/// take part in the wording match.
fn classify_reqwest(err: reqwest::Error, cfg: &ProviderConfig) -> ModelError {
    if err.is_timeout() {
        return ModelError::Timeout(cfg.timeout.as_secs());
    }
    let err = err.without_url();
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    normalize::classify_message(&message)
}
