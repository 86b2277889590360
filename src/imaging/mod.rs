pub mod prepare;

use std::path::Path;

use base64::Engine as _;

use crate::errors::{BridgeError, BridgeResult};

pub use prepare::ImagePreparer;

/// Read `path` and return its base64 (standard alphabet) encoding.
pub async fn encode_base64(path: &Path) -> BridgeResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| BridgeError::Image(format!("{}: {e}", path.display())))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// MIME type inferred from the file extension, defaulting to JPEG.
pub fn media_type(path: &Path) -> &'static str {
    image::ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .unwrap_or("image/jpeg")
}

/// Run [`ImagePreparer::prepare`] off the async executor.
pub async fn prepare_blocking(preparer: &ImagePreparer, path: &Path) -> BridgeResult<std::path::PathBuf> {
    let preparer = preparer.clone();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || preparer.prepare(&path))
        .await
        .map_err(|e| BridgeError::Image(format!("join: {e}")))?
}
