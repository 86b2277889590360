pub mod config;
pub mod errors;
pub mod grammar;
pub mod imaging;
pub mod llm;
pub mod monitor;
pub mod sidecar;

pub use errors::{BridgeError, BridgeResult, ModelError, ModelResult, ModelResultExt, ParseFailure};
pub use llm::VisionModel;

/// Install the global tracing subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .try_init();
}
