//! Run configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration of one simulation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Name of the root node.
    pub name: String,
    /// Seed of the tree's random stream.
    pub seed: u64,
    /// Collectors are reset once when the clock first reaches this time.
    pub warmup_until: Option<f64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "root".to_string(),
            seed: 0,
            warmup_until: None,
        }
    }
}

impl SimConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: SimConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(w) = self.warmup_until {
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "warmup_until must be a non-negative finite time, got {w}"
                )));
            }
        }
        Ok(())
    }
}
