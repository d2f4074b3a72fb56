//! Read-only accuracy audit of a registered model.

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::dataset::{TrainingExample, TrainingSetBuilder};
use crate::error::{PrefnetError, Result};
use crate::features::FeatureExtractor;
use crate::network::BatchScore;
use crate::registry::ModelRegistry;
use crate::run::ModelId;

/// Default number of recent user/item pairs an evaluation pulls.
pub const DEFAULT_EVALUATION_SAMPLE_LIMIT: usize = 500;

/// Accuracy of a model over a set of labeled examples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_id: ModelId,
    pub accuracy: f64,
    pub correct_predictions: usize,
    pub total_predictions: usize,
    pub mean_loss: f64,
}

/// Evaluates registered models. Never modifies the registry.
pub struct Evaluator {
    extractor: Arc<FeatureExtractor>,
    registry: Arc<ModelRegistry>,
    sample_limit: usize,
}

impl Evaluator {
    pub fn new(extractor: Arc<FeatureExtractor>, registry: Arc<ModelRegistry>) -> Self {
        Self {
            extractor,
            registry,
            sample_limit: DEFAULT_EVALUATION_SAMPLE_LIMIT,
        }
    }

    /// Number of recent pairs pulled when no examples are supplied.
    pub fn with_sample_limit(mut self, sample_limit: usize) -> Self {
        self.sample_limit = sample_limit;
        self
    }

    /// Evaluate `model_id` (or the current model) on `examples` (or freshly
    /// collected ones).
    pub fn test_model(
        &self,
        model_id: Option<ModelId>,
        examples: Option<Vec<TrainingExample>>,
    ) -> Result<EvaluationReport> {
        let run = match model_id {
            Some(id) => self.registry.get(id)?,
            None => self.registry.get_current()?,
        };

        let examples = match examples {
            Some(examples) => examples,
            None => {
                run.ensure_compatible(&self.extractor)?;
                TrainingSetBuilder::new(&self.extractor).collect_examples(self.sample_limit, None)?
            }
        };

        let mut score = BatchScore::default();
        for example in &examples {
            if example.features.len() != run.input_size() {
                return Err(PrefnetError::dimension_mismatch(
                    run.input_size(),
                    example.features.len(),
                ));
            }
            example.ensure_finite()?;
            score.record(run.predict(&example.features)?, example.label);
        }

        let report = EvaluationReport {
            model_id: run.id,
            accuracy: score.accuracy(),
            correct_predictions: score.correct,
            total_predictions: score.total,
            mean_loss: score.mean_loss(),
        };
        info!(
            "model {} accuracy {:.4} ({}/{})",
            report.model_id, report.accuracy, report.correct_predictions, report.total_predictions
        );
        Ok(report)
    }
}
