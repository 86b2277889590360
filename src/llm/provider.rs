use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::ModelResult;

/// Unified vision-model trait. Every backend adapter implements it.
///
/// Implementations must not panic or retry, must accept an empty `images`
/// slice, and must be safe to call concurrently through `&self`.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Send `prompt` plus `images` (in order) as one request and normalize the answer.
    async fn get_response(&self, prompt: &str, images: &[PathBuf]) -> ModelResult;
}
