//! Configuration for processors and the in-memory store.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! [processor]
//! worker_threads = 4
//! entity_locking = true
//!
//! [store]
//! durable_path = "data/store.json"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Workers serving `OperationMode::Concurrent` requests.
    pub worker_threads: usize,
    /// Serialize writers per entity name.
    pub entity_locking: bool,
    /// Reject blocking calls tagged `ExecutionContext::Interactive`.
    pub guard_interactive: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            entity_locking: true,
            guard_interactive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// File that receives the durable snapshot on persist.
    pub durable_path: Option<PathBuf>,
    /// Whether delete-by-query may use the store's native predicate deletion.
    pub native_batch_delete: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            durable_path: None,
            native_batch_delete: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreflowConfig {
    pub processor: ProcessorConfig,
    pub store: StoreConfig,
}

impl StoreflowConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: StoreflowConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processor.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "processor.worker_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
