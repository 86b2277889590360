use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ProviderEntry;
use crate::errors::{BridgeError, BridgeResult};

/// Chat message in the OpenAI-compatible wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user".into(),
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Validated, immutable settings for one adapter instance.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: None,
            api_key: String::new(),
            model: model.into(),
            temperature: 0.0,
            max_tokens: 300,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build from a config file entry; the key has already been resolved.
    pub fn from_entry(entry: &ProviderEntry, api_key: String) -> BridgeResult<Self> {
        let mut cfg = Self::new(entry.model.clone())
            .with_api_key(api_key)
            .with_temperature(entry.temperature)
            .with_max_tokens(entry.max_tokens)
            .with_timeout(Duration::from_secs(entry.timeout_secs));
        cfg.base_url = entry.api_base.clone();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.model.trim().is_empty() {
            return Err(BridgeError::Config("model identifier is empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(BridgeError::Config(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(BridgeError::Config("max_tokens must be positive".into()));
        }
        Ok(())
    }
}
