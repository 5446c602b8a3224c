use serde::Deserialize;
use std::path::Path;

/// How requests are executed.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One implicit worker applies every request in input order.
    #[default]
    Sequential,
    /// A producer feeds a fixed pool of workers through the lock-free queue.
    Parallel,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub mode: Mode,
    /// Worker pool size in parallel mode.
    #[serde(default = "defaults::workers")]
    pub workers: usize,
    /// Concurrent readers admitted by the feed's lock before a drain.
    #[serde(default = "defaults::reader_cap")]
    pub reader_cap: usize,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

mod defaults {
    pub fn workers() -> usize {
        4
    }

    pub fn reader_cap() -> usize {
        32
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            workers: defaults::workers(),
            reader_cap: defaults::reader_cap(),
            log_level: defaults::log_level(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&toml_to_str)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Sequential run configuration.
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Parallel run configuration with `workers` consumers.
    pub fn parallel(workers: usize) -> Self {
        Self {
            mode: Mode::Parallel,
            workers,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == Mode::Parallel && self.workers == 0 {
            return Err(ConfigError::Invalid("parallel mode needs at least one worker"));
        }
        if self.reader_cap == 0 {
            return Err(ConfigError::Invalid("reader_cap must be at least 1"));
        }
        Ok(())
    }
}
