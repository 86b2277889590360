use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::Router;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use url::Url;

use crate::errors::{BridgeError, BridgeResult};

/// Ports tried, starting at the preferred one.
const PORT_PROBE_LIMIT: u16 = 100;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Loopback HTTP file server that makes local screenshots fetchable by URL.
///
/// Serves `GET /<relative path>` from `root`. Outside files are copied into
/// the root under their base name, so two same-named files from different
/// directories overwrite each other (last write wins).
pub struct ImageServer {
    preferred_port: u16,
    root: PathBuf,
    state: Mutex<Option<Running>>,
}

struct Running {
    port: u16,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ImageServer {
    /// `root` must exist; it is canonicalized so prefix checks are reliable.
    pub fn new(preferred_port: u16, root: impl AsRef<Path>) -> BridgeResult<Self> {
        let root = std::fs::canonicalize(root.as_ref()).map_err(|e| {
            BridgeError::Sidecar(format!("serve root {}: {e}", root.as_ref().display()))
        })?;
        if !root.is_dir() {
            return Err(BridgeError::Sidecar(format!(
                "serve root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            preferred_port,
            root,
            state: Mutex::new(None),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bound port, or `None` when stopped.
    pub async fn port(&self) -> Option<u16> {
        self.state.lock().await.as_ref().map(|r| r.port)
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Bind the first free port at or after the preferred one and spawn the
    /// accept loop. Returns the bound port; a no-op when already running.
    pub async fn start(&self) -> BridgeResult<u16> {
        let mut state = self.state.lock().await;
        if let Some(running) = state.as_ref() {
            return Ok(running.port);
        }

        let std_listener = bind_free_port(self.preferred_port)?;
        let port = std_listener.local_addr()?.port();
        std_listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(std_listener)?;

        let app = Router::new().fallback_service(ServeDir::new(&self.root));
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(error = %e, "image server terminated");
            }
        });

        tracing::info!(port, root = %self.root.display(), "image server started: http://localhost:{port}");
        *state = Some(Running {
            port,
            shutdown: tx,
            task,
        });
        Ok(port)
    }

    /// Stop the accept loop and release the port. A no-op when not running.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let Some(running) = state.take() else {
            return;
        };
        let _ = running.shutdown.send(());
        let mut task = running.task;
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            tracing::warn!(port = running.port, "image server did not drain in time, aborting");
            task.abort();
            let _ = task.await;
        }
        tracing::info!(port = running.port, "image server stopped");
    }

    /// URL under which `file` can be fetched from this server.
    ///
    /// Files outside the served root are copied into it first.
    pub async fn url_for(&self, file: &Path) -> BridgeResult<String> {
        let port = self
            .port()
            .await
            .ok_or_else(|| BridgeError::Sidecar("image server is not running".into()))?;

        let canonical = tokio::fs::canonicalize(file)
            .await
            .map_err(|e| BridgeError::Sidecar(format!("{}: {e}", file.display())))?;

        let rel = match canonical.strip_prefix(&self.root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                let name = canonical.file_name().ok_or_else(|| {
                    BridgeError::Sidecar(format!("{} has no file name", canonical.display()))
                })?;
                let dest = self.root.join(name);
                tokio::fs::copy(&canonical, &dest).await?;
                tracing::debug!(
                    src = %canonical.display(),
                    dst = %dest.display(),
                    "copied file into served root"
                );
                PathBuf::from(name)
            }
        };

        build_url(port, &rel)
    }
}

impl Drop for ImageServer {
    fn drop(&mut self) {
        if let Some(running) = self.state.get_mut().take() {
            let _ = running.shutdown.send(());
            running.task.abort();
        }
    }
}

fn bind_free_port(preferred: u16) -> BridgeResult<std::net::TcpListener> {
    let end = preferred.saturating_add(PORT_PROBE_LIMIT);
    for offset in 0..PORT_PROBE_LIMIT {
        let Some(port) = preferred.checked_add(offset) else {
            break;
        };
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        match std::net::TcpListener::bind(addr) {
            Ok(listener) => return Ok(listener),
            Err(e) => tracing::debug!(port, error = %e, "port unavailable"),
        }
    }
    Err(BridgeError::PortsExhausted {
        start: preferred,
        end,
    })
}

fn build_url(port: u16, rel: &Path) -> BridgeResult<String> {
    let mut url = Url::parse(&format!("http://localhost:{port}/"))
        .map_err(|e| BridgeError::Sidecar(format!("url: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| BridgeError::Sidecar("url cannot be a base".into()))?
        .pop_if_empty()
        .extend(rel.components().map(|c| c.as_os_str().to_string_lossy()));
    Ok(url.to_string())
}
