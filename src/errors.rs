use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Image preparation error: {0}")]
    Image(String),

    #[error("Image server error: {0}")]
    Sidecar(String),

    #[error("No free port in {start}..{end}")]
    PortsExhausted { start: u16, end: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Classified failure of a single model call.
///
/// Adapters never let transport or decoding errors escape; every failure path
/// ends up as one of these variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Request failed: {0}")]
    NetworkError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("{0}")]
    ProviderError(String),

    #[error("Invalid response format: {0}")]
    MalformedResponse(String),

    #[error("Model returned empty response: {0}")]
    EmptyResponse(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Adapter error: {0}")]
    AdapterError(String),
}

/// Outcome of one adapter call: the completion text or a classified failure.
pub type ModelResult = Result<String, ModelError>;

/// Converts a [`ModelResult`] into the `(ok, text_or_reason)` pair the agent loop consumes.
pub trait ModelResultExt {
    fn into_pair(self) -> (bool, String);
}

impl ModelResultExt for ModelResult {
    fn into_pair(self) -> (bool, String) {
        match self {
            Ok(text) => (true, text),
            Err(e) => (false, e.to_string()),
        }
    }
}

/// A model response that does not follow the requested grammar.
///
/// Deliberately carries no machine-readable cause; `reason` is for logs only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparseable model response: {reason}")]
pub struct ParseFailure {
    reason: String,
}

impl ParseFailure {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
