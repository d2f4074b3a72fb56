//! Engine configuration.
//!
//! Every section has sensible defaults, so a configuration file only needs
//! the values it overrides:
//!
//! ```json
//! {
//!   "training": { "hidden_layers": [16, 8], "epochs": 200 },
//!   "registry": { "directory": "/var/lib/prefnet/models" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PrefnetError, Result};
use crate::evaluator::DEFAULT_EVALUATION_SAMPLE_LIMIT;
use crate::features::FeatureConfig;
use crate::trainer::TrainingConfig;

/// Where trained models are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory of the file registry. `None` keeps models in memory.
    pub directory: Option<PathBuf>,
    /// fsync each saved model.
    pub sync_writes: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            directory: None,
            sync_writes: true,
        }
    }
}

/// Top-level configuration of a [`PreferenceEngine`](crate::engine::PreferenceEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub registry: RegistryConfig,
    /// Recent user/item pairs pulled by an evaluation without explicit examples.
    pub evaluation_sample_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            training: TrainingConfig::default(),
            registry: RegistryConfig::default(),
            evaluation_sample_limit: DEFAULT_EVALUATION_SAMPLE_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Load a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PrefnetError::invalid_config("config", format!("cannot read {}: {e}", path.display()))
        })?;
        let config: EngineConfig = serde_json::from_str(&content).map_err(|e| {
            PrefnetError::invalid_config("config", format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.training.validate()?;
        if self.evaluation_sample_limit == 0 {
            return Err(PrefnetError::invalid_config(
                "evaluation_sample_limit",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}
