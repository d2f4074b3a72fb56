//! Trained model records.
//!
//! A [`TrainingRun`] bundles everything needed to reproduce predictions of a
//! trained network: architecture, parameters, activation, hyperparameters,
//! feature scaling and the metric history. Runs are immutable once saved to
//! the registry and are shared as `Arc<TrainingRun>` snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PrefnetError, Result};
use crate::features::{FeatureExtractor, FeatureNormalization};
use crate::network::{Activation, ModelParameters, NetworkArchitecture, NeuralNetwork};
use crate::trainer::TrainingConfig;

/// Unique identifier of a registered model.
pub type ModelId = Uuid;

/// Loss and accuracy after one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub training_loss: f64,
    pub validation_loss: f64,
    pub training_accuracy: f64,
    pub validation_accuracy: f64,
}

/// A finished training run and its trained network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub id: ModelId,
    pub created_at: DateTime<Utc>,
    pub hyperparameters: TrainingConfig,
    pub network: NeuralNetwork,
    /// Scaling applied to raw feature vectors before the forward pass.
    pub normalization: FeatureNormalization,
    pub feature_schema_version: u32,
    pub epoch_metrics: Vec<EpochMetrics>,
    pub final_metrics: EpochMetrics,
    /// Examples pulled for the run, before the split.
    pub sample_count: usize,
    pub training_samples: usize,
    pub validation_samples: usize,
    pub early_stopped: bool,
    pub training_time_ms: u64,
}

impl TrainingRun {
    pub fn architecture(&self) -> &NetworkArchitecture {
        self.network.architecture()
    }

    pub fn activation(&self) -> Activation {
        self.network.activation()
    }

    pub fn parameters(&self) -> &ModelParameters {
        self.network.parameters()
    }

    /// Feature dimensionality the model was trained on.
    pub fn input_size(&self) -> usize {
        self.architecture().input_size()
    }

    /// Fail unless `extractor` produces the vectors this model was trained on.
    pub fn ensure_compatible(&self, extractor: &FeatureExtractor) -> Result<()> {
        if self.input_size() != extractor.dimension() {
            return Err(PrefnetError::dimension_mismatch(
                self.input_size(),
                extractor.dimension(),
            ));
        }
        if self.feature_schema_version != extractor.schema_version() {
            return Err(PrefnetError::schema_mismatch(
                self.feature_schema_version,
                extractor.schema_version(),
            ));
        }
        Ok(())
    }

    /// Scale a raw feature vector and score it.
    pub fn predict(&self, raw_features: &[f64]) -> Result<f64> {
        let scaled = self.normalization.apply(raw_features)?;
        self.network.predict(&scaled)
    }

    /// Lightweight view used by model history listings.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            model_id: self.id,
            created_at: self.created_at,
            architecture: self.architecture().layer_sizes().to_vec(),
            activation: self.activation(),
            training_epochs: self.epoch_metrics.len(),
            sample_count: self.sample_count,
            final_training_loss: self.final_metrics.training_loss,
            final_validation_loss: self.final_metrics.validation_loss,
            final_training_accuracy: self.final_metrics.training_accuracy,
            final_validation_accuracy: self.final_metrics.validation_accuracy,
        }
    }
}

/// Summary row of a registered run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub model_id: ModelId,
    pub created_at: DateTime<Utc>,
    pub architecture: Vec<usize>,
    pub activation: Activation,
    pub training_epochs: usize,
    pub sample_count: usize,
    pub final_training_loss: f64,
    pub final_validation_loss: f64,
    pub final_training_accuracy: f64,
    pub final_validation_accuracy: f64,
}
