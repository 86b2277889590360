use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{BridgeError, BridgeResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelSection,
    #[serde(default)]
    pub openai: Option<OpenAiEntry>,
    #[serde(default)]
    pub ollama: Option<OllamaEntry>,
    #[serde(default)]
    pub gateway: Option<ProviderEntry>,
    #[serde(default)]
    pub anthropic: Option<ProviderEntry>,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub sidecar: SidecarConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Openai,
    Ollama,
    Gateway,
    Anthropic,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Openai => "openai",
            Backend::Ollama => "ollama",
            Backend::Gateway => "gateway",
            Backend::Anthropic => "anthropic",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    pub backend: Backend,
}

/// Settings shared by every backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Endpoint or base URL. Optional for backends with a well-known default.
    #[serde(default)]
    pub api_base: Option<String>,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Falls back to env var VLM_BRIDGE_<BACKEND>_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiEntry {
    #[serde(flatten)]
    pub provider: ProviderEntry,
    /// How screenshots reach the endpoint.
    #[serde(default)]
    pub image_transport: ImageTransportKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageTransportKind {
    /// base64 data URLs in the request body.
    #[default]
    Inline,
    /// URLs pointing at the local image server.
    Served,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaEntry {
    #[serde(flatten)]
    pub provider: ProviderEntry,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_max_image_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    /// Where downscaled copies are written. Defaults to the user cache dir.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_image_bytes(),
            max_dimension: default_max_dimension(),
            scratch_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    #[serde(default = "default_sidecar_port")]
    pub port: u16,
    /// Served root. Defaults to the working directory.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            port: default_sidecar_port(),
            root: None,
        }
    }
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    300
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_num_ctx() -> u32 {
    8192
}

fn default_top_p() -> f32 {
    0.9
}

fn default_repeat_penalty() -> f32 {
    1.1
}

fn default_max_image_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_max_dimension() -> u32 {
    2048
}

fn default_sidecar_port() -> u16 {
    8765
}

impl AppConfig {
    /// Parse a config document and check that the selected backend has a section.
    pub fn from_toml_str(content: &str) -> BridgeResult<Self> {
        let config: AppConfig = toml::from_str(content)?;
        let present = match config.model.backend {
            Backend::Openai => config.openai.is_some(),
            Backend::Ollama => config.ollama.is_some(),
            Backend::Gateway => config.gateway.is_some(),
            Backend::Anthropic => config.anthropic.is_some(),
        };
        if !present {
            return Err(BridgeError::Config(format!(
                "backend '{}' selected but [{}] section is missing",
                config.model.backend.as_str(),
                config.model.backend.as_str()
            )));
        }
        Ok(config)
    }
}

/// API key for `backend`: the environment wins over the config file.
pub fn resolve_api_key(backend: Backend, entry: &ProviderEntry) -> String {
    std::env::var(format!(
        "VLM_BRIDGE_{}_API_KEY",
        backend.as_str().to_uppercase()
    ))
    .unwrap_or_else(|_| entry.api_key.clone().unwrap_or_default())
}

fn resolve_config_path() -> BridgeResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(BridgeError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

/// Load the config from `path`, or from the default locations when `None`.
pub fn load_config(path: Option<&Path>) -> BridgeResult<AppConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => resolve_config_path()?,
    };
    let content = std::fs::read_to_string(&path)?;
    let config = AppConfig::from_toml_str(&content)?;
    tracing::info!(path = %path.display(), backend = config.model.backend.as_str(), "config loaded");
    Ok(config)
}
