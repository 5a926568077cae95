// Adapters - External system implementations

pub mod local_resources;
pub mod mock_engine;
pub mod process_engine;
pub mod toml_config;

// Re-export adapters
pub use local_resources::LocalFirstResources;
pub use mock_engine::MockEngine;
pub use process_engine::ProcessEngine;
pub use toml_config::{TomlConfigAdapter, TrimConfig};
