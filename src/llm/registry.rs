use std::sync::Arc;

use crate::config::{resolve_api_key, AppConfig, Backend, ImageTransportKind};
use crate::errors::{BridgeError, BridgeResult};
use crate::imaging::ImagePreparer;
use crate::llm::provider::VisionModel;
use crate::llm::providers::anthropic::AnthropicProvider;
use crate::llm::providers::gateway::GatewayProvider;
use crate::llm::providers::ollama::{OllamaOptions, OllamaProvider};
use crate::llm::providers::openai_compatible::{ImageTransport, OpenAiCompatibleProvider};
use crate::llm::types::ProviderConfig;
use crate::sidecar::ImageServer;

/// Build the adapter selected by `[model] backend`.
///
/// `server` is required only when the OpenAI backend serves images by URL;
/// the caller owns its lifecycle.
pub fn build_model(
    config: &AppConfig,
    server: Option<Arc<ImageServer>>,
) -> BridgeResult<Arc<dyn VisionModel>> {
    let backend = config.model.backend;
    let preparer = ImagePreparer::from_config(&config.image);
    let missing = || BridgeError::Config(format!("[{}] section is missing", backend.as_str()));

    let model: Arc<dyn VisionModel> = match backend {
        Backend::Openai => {
            let entry = config.openai.as_ref().ok_or_else(missing)?;
            let cfg = ProviderConfig::from_entry(&entry.provider, resolve_api_key(backend, &entry.provider))?;
            let transport = match entry.image_transport {
                ImageTransportKind::Inline => ImageTransport::Inline(preparer),
                ImageTransportKind::Served => ImageTransport::Served(server.ok_or_else(|| {
                    BridgeError::Config("image_transport = \"served\" needs a running image server".into())
                })?),
            };
            Arc::new(OpenAiCompatibleProvider::new(backend.as_str(), cfg, transport)?)
        }
        Backend::Ollama => {
            let entry = config.ollama.as_ref().ok_or_else(missing)?;
            let cfg = ProviderConfig::from_entry(&entry.provider, resolve_api_key(backend, &entry.provider))?;
            let options = OllamaOptions {
                num_ctx: entry.num_ctx,
                top_p: entry.top_p,
                repeat_penalty: entry.repeat_penalty,
                ..OllamaOptions::from_config(&cfg)
            };
            Arc::new(OllamaProvider::new(backend.as_str(), cfg)?.with_options(options))
        }
        Backend::Gateway => {
            let entry = config.gateway.as_ref().ok_or_else(missing)?;
            let cfg = ProviderConfig::from_entry(entry, resolve_api_key(backend, entry))?;
            Arc::new(GatewayProvider::new(backend.as_str(), cfg, preparer)?)
        }
        Backend::Anthropic => {
            let entry = config.anthropic.as_ref().ok_or_else(missing)?;
            let cfg = ProviderConfig::from_entry(entry, resolve_api_key(backend, entry))?;
            Arc::new(AnthropicProvider::new(backend.as_str(), cfg, preparer)?)
        }
    };

    tracing::info!(backend = backend.as_str(), "vision model ready");
    Ok(model)
}

/// Whether `config` needs the local image server.
pub fn needs_image_server(config: &AppConfig) -> bool {
    config.model.backend == Backend::Openai
        && config
            .openai
            .as_ref()
            .is_some_and(|e| e.image_transport == ImageTransportKind::Served)
}
