pub mod server;

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tokio::sync::Mutex;

use crate::config::SidecarConfig;
use crate::errors::BridgeResult;

pub use server::ImageServer;

// ── Process-wide convenience handle ───────────────────────────────────────────
// Adapters take an explicit `Arc<ImageServer>`; this slot is only for the
// outermost assembly code.

static GLOBAL: OnceLock<Mutex<Option<Arc<ImageServer>>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<Arc<ImageServer>>> {
    GLOBAL.get_or_init(|| Mutex::new(None))
}

/// Build a server from config (root defaults to the working directory).
pub fn from_config(cfg: &SidecarConfig) -> BridgeResult<ImageServer> {
    let root = match &cfg.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    ImageServer::new(cfg.port, root)
}

/// Install and start the global server, replacing (and stopping) any previous one.
pub async fn init_global(port: u16, root: impl Into<PathBuf>) -> BridgeResult<Arc<ImageServer>> {
    let server = Arc::new(ImageServer::new(port, root.into())?);
    server.start().await?;

    let previous = slot().lock().await.replace(server.clone());
    if let Some(previous) = previous {
        previous.stop().await;
    }
    Ok(server)
}

/// The global server, created with default settings and started on first use.
pub async fn global_server() -> BridgeResult<Arc<ImageServer>> {
    let mut guard = slot().lock().await;
    if let Some(server) = guard.as_ref() {
        server.start().await?;
        return Ok(server.clone());
    }
    let server = Arc::new(from_config(&SidecarConfig::default())?);
    server.start().await?;
    *guard = Some(server.clone());
    Ok(server)
}

/// Stop and forget the global server. Safe to call when none exists.
pub async fn teardown_global() {
    let server = slot().lock().await.take();
    if let Some(server) = server {
        server.stop().await;
    }
}
