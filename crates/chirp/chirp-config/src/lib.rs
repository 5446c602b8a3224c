mod config;

pub use config::{ConfigError, Mode, ServerConfig};
