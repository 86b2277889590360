pub mod normalize;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod types;

pub use provider::VisionModel;
pub use types::ProviderConfig;
