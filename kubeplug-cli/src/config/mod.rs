mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{HostConfig, RawHostConfig, RawManagerConfig, RawPluginsConfig, RawServerConfig};
