//! Stochastic gradient descent training of preference models.
//!
//! A training run is all-or-nothing: the configuration is validated before
//! any data is read, examples are pulled and featurized before the numeric
//! loop starts, and the finished run is handed to the registry only after the
//! last epoch completed. A failure anywhere leaves the registry untouched.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dataset::{TrainingExample, TrainingSetBuilder, build_training_set, validate_split};
use crate::error::{PrefnetError, Result};
use crate::features::{FEATURE_SCHEMA_VERSION, FeatureExtractor, FeatureNormalization};
use crate::network::{Activation, BatchScore, NetworkArchitecture, NeuralNetwork};
use crate::registry::ModelRegistry;
use crate::run::{EpochMetrics, ModelId, TrainingRun};

/// Mixed into the seed so epoch shuffles do not replay the split shuffle.
const SHUFFLE_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// When to end training.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum StoppingPolicy {
    /// Always run the configured number of epochs.
    #[default]
    FixedEpochs,
    /// Stop once validation loss has not improved by `min_delta` for
    /// `patience` consecutive epochs.
    EarlyStopping { patience: usize, min_delta: f64 },
}

/// Hyperparameters of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    pub epochs: usize,
    pub validation_split: f64,
    /// Maximum number of examples pulled from the behavior store.
    pub training_data_limit: usize,
    pub activation_function: Activation,
    /// Seed for initialization, the split and per-epoch shuffles.
    pub seed: u64,
    /// Training refuses to start with fewer examples than this.
    pub min_training_samples: usize,
    pub stopping: StoppingPolicy,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![8, 6],
            learning_rate: 0.01,
            epochs: 1000,
            validation_split: 0.2,
            training_data_limit: 2000,
            activation_function: Activation::Sigmoid,
            seed: 42,
            min_training_samples: 100,
            stopping: StoppingPolicy::FixedEpochs,
        }
    }
}

impl TrainingConfig {
    /// Check every hyperparameter, naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.hidden_layers.is_empty() {
            return Err(PrefnetError::invalid_config(
                "hidden_layers",
                "at least one hidden layer is required",
            ));
        }
        if self.hidden_layers.contains(&0) {
            return Err(PrefnetError::invalid_config(
                "hidden_layers",
                "layer sizes must be greater than 0",
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(PrefnetError::invalid_config(
                "learning_rate",
                format!("must be a positive number, got {}", self.learning_rate),
            ));
        }
        if self.epochs == 0 {
            return Err(PrefnetError::invalid_config(
                "epochs",
                "must be greater than 0",
            ));
        }
        validate_split(self.validation_split)?;
        if self.training_data_limit == 0 {
            return Err(PrefnetError::invalid_config(
                "training_data_limit",
                "must be greater than 0",
            ));
        }
        if let StoppingPolicy::EarlyStopping {
            patience,
            min_delta,
        } = self.stopping
        {
            if patience == 0 {
                return Err(PrefnetError::invalid_config(
                    "stopping.patience",
                    "must be greater than 0",
                ));
            }
            if !(min_delta.is_finite() && min_delta >= 0.0) {
                return Err(PrefnetError::invalid_config(
                    "stopping.min_delta",
                    format!("must be a non-negative number, got {min_delta}"),
                ));
            }
        }
        Ok(())
    }
}

/// Result payload of a successful training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_id: ModelId,
    pub training_samples: usize,
    pub final_training_loss: f64,
    pub final_validation_loss: f64,
    pub final_training_accuracy: f64,
    pub final_validation_accuracy: f64,
    pub training_epochs: usize,
    pub early_stopped: bool,
}

impl TrainingReport {
    fn from_run(run: &TrainingRun) -> Self {
        Self {
            model_id: run.id,
            training_samples: run.sample_count,
            final_training_loss: run.final_metrics.training_loss,
            final_validation_loss: run.final_metrics.validation_loss,
            final_training_accuracy: run.final_metrics.training_accuracy,
            final_validation_accuracy: run.final_metrics.validation_accuracy,
            training_epochs: run.epoch_metrics.len(),
            early_stopped: run.early_stopped,
        }
    }
}

/// Outcome of a guarded retrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrainOutcome {
    /// The candidate was registered and is now current.
    Promoted {
        report: TrainingReport,
        /// Validation accuracy gained over the previous model (0.0 if none).
        improvement: f64,
    },
    /// The candidate validated worse than the current model and was discarded.
    Rejected {
        current_model_id: ModelId,
        candidate_validation_accuracy: f64,
        improvement: f64,
    },
}

/// Runs training jobs and registers their results.
pub struct Trainer {
    extractor: Arc<FeatureExtractor>,
    registry: Arc<ModelRegistry>,
}

impl Trainer {
    pub fn new(extractor: Arc<FeatureExtractor>, registry: Arc<ModelRegistry>) -> Self {
        Self {
            extractor,
            registry,
        }
    }

    /// Pull examples from the behavior store, train, and register the model.
    pub fn train_model(&self, config: &TrainingConfig) -> Result<TrainingReport> {
        let run = self.train_candidate(config)?;
        self.register(run)
    }

    /// Train on caller-supplied examples and register the model.
    pub fn train_on_examples(
        &self,
        config: &TrainingConfig,
        examples: Vec<TrainingExample>,
    ) -> Result<TrainingReport> {
        let run = fit(config, examples)?;
        self.register(run)
    }

    /// Train a candidate and register it only if it validates at least as
    /// well as the current model.
    pub fn retrain(&self, config: &TrainingConfig) -> Result<RetrainOutcome> {
        let current = match self.registry.get_current() {
            Ok(current) => Some(current),
            Err(PrefnetError::NoModelAvailable) => None,
            Err(e) => return Err(e),
        };

        let candidate = self.train_candidate(config)?;
        let baseline = current
            .as_ref()
            .map_or(0.0, |run| run.final_metrics.validation_accuracy);
        let improvement = candidate.final_metrics.validation_accuracy - baseline;

        if let Some(current) = current
            && improvement < 0.0
        {
            info!(
                "retrain rejected: candidate validation accuracy {:.4} below current {:.4}",
                candidate.final_metrics.validation_accuracy, baseline
            );
            return Ok(RetrainOutcome::Rejected {
                current_model_id: current.id,
                candidate_validation_accuracy: candidate.final_metrics.validation_accuracy,
                improvement,
            });
        }

        let report = self.register(candidate)?;
        Ok(RetrainOutcome::Promoted {
            report,
            improvement,
        })
    }

    fn train_candidate(&self, config: &TrainingConfig) -> Result<TrainingRun> {
        config.validate()?;

        let examples = TrainingSetBuilder::new(&self.extractor)
            .collect_examples(config.training_data_limit, None)?;
        if examples.first().is_some_and(|e| e.features.len() != self.extractor.dimension()) {
            return Err(PrefnetError::dimension_mismatch(
                self.extractor.dimension(),
                examples[0].features.len(),
            ));
        }

        fit(config, examples)
    }

    fn register(&self, run: TrainingRun) -> Result<TrainingReport> {
        let report = TrainingReport::from_run(&run);
        let model_id = self.registry.save(run)?;
        info!(
            "registered model {model_id}: {} epochs, training accuracy {:.4}, validation accuracy {:.4}",
            report.training_epochs, report.final_training_accuracy, report.final_validation_accuracy
        );
        Ok(report)
    }
}

/// Train a network on `examples` without registering it.
///
/// Enforces the sample floor, fits feature scaling on all examples, splits,
/// and runs SGD epochs under the configured stopping policy.
pub fn fit(config: &TrainingConfig, examples: Vec<TrainingExample>) -> Result<TrainingRun> {
    config.validate()?;

    let sample_count = examples.len();
    let required = config.min_training_samples.max(1);
    if sample_count < required {
        return Err(PrefnetError::insufficient_data(sample_count, required));
    }

    let dimension = examples[0].features.len();
    if let Some(bad) = examples.iter().find(|e| e.features.len() != dimension) {
        return Err(PrefnetError::dimension_mismatch(dimension, bad.features.len()));
    }
    for example in &examples {
        example.ensure_finite()?;
    }

    let created_at = Utc::now();
    let started = Instant::now();

    let normalization = FeatureNormalization::fit(examples.iter().map(|e| e.features.as_slice()))?;
    let scaled: Vec<(Vec<f64>, f64)> = examples
        .iter()
        .map(|e| Ok((normalization.apply(&e.features)?, e.label)))
        .collect::<Result<_>>()?;

    let (train_set, validation_set) =
        build_training_set(scaled, config.validation_split, config.seed)?;

    let architecture = NetworkArchitecture::with_hidden(dimension, &config.hidden_layers)?;
    let mut network = NeuralNetwork::new(architecture, config.activation_function, config.seed);

    info!(
        "training {:?} ({}) on {} examples ({} train / {} validation) for up to {} epochs",
        network.architecture().layer_sizes(),
        config.activation_function,
        sample_count,
        train_set.len(),
        validation_set.len(),
        config.epochs
    );

    let mut rng = StdRng::seed_from_u64(config.seed ^ SHUFFLE_STREAM);
    let mut order: Vec<usize> = (0..train_set.len()).collect();
    let mut epoch_metrics = Vec::with_capacity(config.epochs);
    let mut best_validation_loss = f64::INFINITY;
    let mut stale_epochs = 0usize;
    let mut early_stopped = false;

    for epoch in 1..=config.epochs {
        order.shuffle(&mut rng);
        for &index in &order {
            let (features, label) = &train_set[index];
            network.train_example(features, *label, config.learning_rate)?;
        }

        let train_score = score(&network, &train_set)?;
        let validation_score = score(&network, &validation_set)?;
        let metrics = EpochMetrics {
            epoch,
            training_loss: train_score.mean_loss(),
            validation_loss: validation_score.mean_loss(),
            training_accuracy: train_score.accuracy(),
            validation_accuracy: validation_score.accuracy(),
        };
        debug!(
            "epoch {epoch}: loss {:.6}/{:.6} accuracy {:.4}/{:.4}",
            metrics.training_loss,
            metrics.validation_loss,
            metrics.training_accuracy,
            metrics.validation_accuracy
        );
        epoch_metrics.push(metrics);

        if let StoppingPolicy::EarlyStopping {
            patience,
            min_delta,
        } = config.stopping
        {
            if metrics.validation_loss < best_validation_loss - min_delta {
                best_validation_loss = metrics.validation_loss;
                stale_epochs = 0;
            } else {
                stale_epochs += 1;
                if stale_epochs >= patience {
                    info!("early stopping after epoch {epoch}");
                    early_stopped = true;
                    break;
                }
            }
        }
    }

    if !network.parameters().is_finite() {
        return Err(PrefnetError::invalid_config(
            "learning_rate",
            format!("training diverged at learning rate {}", config.learning_rate),
        ));
    }

    let final_metrics = *epoch_metrics
        .last()
        .ok_or_else(|| PrefnetError::invalid_config("epochs", "must be greater than 0"))?;

    Ok(TrainingRun {
        id: Uuid::new_v4(),
        created_at,
        hyperparameters: config.clone(),
        network,
        normalization,
        feature_schema_version: FEATURE_SCHEMA_VERSION,
        epoch_metrics,
        final_metrics,
        sample_count,
        training_samples: train_set.len(),
        validation_samples: validation_set.len(),
        early_stopped,
        training_time_ms: started.elapsed().as_millis() as u64,
    })
}

fn score(network: &NeuralNetwork, data: &[(Vec<f64>, f64)]) -> Result<BatchScore> {
    let mut score = BatchScore::default();
    for (features, label) in data {
        score.record(network.predict(features)?, *label);
    }
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    /// Examples whose label is 1.0 exactly when the first feature exceeds 0.5.
    fn separable_examples(count: usize, dimension: usize, seed: u64) -> Vec<TrainingExample> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|i| {
                let features: Vec<f64> = (0..dimension).map(|_| rng.random_range(0.0..1.0)).collect();
                let label = if features[0] > 0.5 { 1.0 } else { 0.0 };
                TrainingExample::new(i as u64, i as u64, features, label)
            })
            .collect()
    }

    fn toy_config() -> TrainingConfig {
        TrainingConfig {
            hidden_layers: vec![4],
            learning_rate: 0.1,
            epochs: 50,
            validation_split: 0.2,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_names_field() {
        let cases: Vec<(TrainingConfig, &str)> = vec![
            (
                TrainingConfig {
                    hidden_layers: vec![],
                    ..TrainingConfig::default()
                },
                "hidden_layers",
            ),
            (
                TrainingConfig {
                    learning_rate: 0.0,
                    ..TrainingConfig::default()
                },
                "learning_rate",
            ),
            (
                TrainingConfig {
                    epochs: 0,
                    ..TrainingConfig::default()
                },
                "epochs",
            ),
            (
                TrainingConfig {
                    validation_split: 1.0,
                    ..TrainingConfig::default()
                },
                "validation_split",
            ),
            (
                TrainingConfig {
                    training_data_limit: 0,
                    ..TrainingConfig::default()
                },
                "training_data_limit",
            ),
            (
                TrainingConfig {
                    stopping: StoppingPolicy::EarlyStopping {
                        patience: 0,
                        min_delta: 0.0,
                    },
                    ..TrainingConfig::default()
                },
                "stopping.patience",
            ),
        ];

        for (config, expected) in cases {
            match config.validate() {
                Err(PrefnetError::InvalidConfiguration { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected InvalidConfiguration for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_fit_requires_minimum_samples() {
        let examples = separable_examples(40, 3, 1);
        match fit(&toy_config(), examples) {
            Err(PrefnetError::InsufficientData { actual, required }) => {
                assert_eq!(actual, 40);
                assert_eq!(required, 100);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn test_fit_rejects_mixed_dimensions() {
        let mut examples = separable_examples(120, 3, 1);
        examples[7].features.push(0.0);
        assert!(matches!(
            fit(&toy_config(), examples),
            Err(PrefnetError::ModelDimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_fit_rejects_non_finite_features() {
        let mut examples = separable_examples(120, 3, 1);
        examples[5].features[0] = f64::NAN;
        match fit(&toy_config(), examples) {
            Err(PrefnetError::InvalidConfiguration { field, message }) => {
                assert_eq!(field, "features");
                assert!(message.contains("pair_view"), "{message}");
            }
            other => panic!("expected InvalidConfiguration on features, got {other:?}"),
        }
    }

    #[test]
    fn test_fit_learns_separable_data() {
        let run = fit(&toy_config(), separable_examples(200, 3, 9)).unwrap();

        assert_eq!(run.epoch_metrics.len(), 50);
        assert_eq!(run.sample_count, 200);
        assert_eq!(run.training_samples + run.validation_samples, 200);
        assert_eq!(run.validation_samples, 40);
        assert!(!run.early_stopped);
        assert!(
            run.final_metrics.training_accuracy > 0.9,
            "training accuracy {}",
            run.final_metrics.training_accuracy
        );

        let first = &run.epoch_metrics[..5];
        let last = &run.epoch_metrics[run.epoch_metrics.len() - 5..];
        let mean = |m: &[EpochMetrics]| m.iter().map(|e| e.training_loss).sum::<f64>() / m.len() as f64;
        assert!(mean(last) < mean(first));
    }

    #[test]
    fn test_fit_is_deterministic_per_seed() {
        let a = fit(&toy_config(), separable_examples(120, 3, 4)).unwrap();
        let b = fit(&toy_config(), separable_examples(120, 3, 4)).unwrap();
        assert_eq!(a.parameters(), b.parameters());
        assert_eq!(a.epoch_metrics, b.epoch_metrics);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_early_stopping_ends_before_epoch_budget() {
        let config = TrainingConfig {
            epochs: 500,
            stopping: StoppingPolicy::EarlyStopping {
                patience: 3,
                min_delta: 0.5,
            },
            ..toy_config()
        };
        let run = fit(&config, separable_examples(120, 3, 2)).unwrap();
        // Only the first epoch can improve on an infinite best loss by 0.5, so
        // training stops `patience` epochs later.
        assert!(run.early_stopped);
        assert_eq!(run.epoch_metrics.len(), 4);
    }
}
