//! Engine configuration.
//!
//! ```yaml
//! history_size: 5
//! max_pending_per_device: 16
//! track_pending: true
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of previous values kept per state key.
pub const DEFAULT_HISTORY_SIZE: usize = 5;
/// Default bound on unconfirmed commands per device.
pub const DEFAULT_MAX_PENDING_PER_DEVICE: usize = 16;

/// Tunables for the state store and command tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Previous values kept per state key. Zero disables history.
    pub history_size: usize,
    /// Unconfirmed commands kept per device; the oldest is evicted first.
    pub max_pending_per_device: usize,
    /// Track built commands until a report confirms them.
    pub track_pending: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            max_pending_per_device: DEFAULT_MAX_PENDING_PER_DEVICE,
            track_pending: true,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from a file; `.yaml`/`.yml` are YAML, everything else JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&source),
            _ => Self::from_json(&source),
        }
    }
}
