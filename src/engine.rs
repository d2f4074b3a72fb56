//! Operational facade wiring extraction, training, registry, scoring and
//! evaluation together.

use std::sync::Arc;

use log::info;

use crate::behavior::{BehaviorStore, Catalog};
use crate::config::EngineConfig;
use crate::dataset::TrainingExample;
use crate::error::Result;
use crate::evaluator::{EvaluationReport, Evaluator};
use crate::features::FeatureExtractor;
use crate::registry::ModelRegistry;
use crate::run::{ModelId, RunSummary};
use crate::scorer::{RecommendationScorer, ScoredCandidate};
use crate::storage::{FileStorage, Storage, StorageConfig};
use crate::trainer::{RetrainOutcome, Trainer, TrainingConfig, TrainingReport};

pub use crate::scorer::{RecommendationRequest, Recommendations};

/// The preference prediction engine.
pub struct PreferenceEngine {
    config: EngineConfig,
    registry: Arc<ModelRegistry>,
    trainer: Trainer,
    scorer: RecommendationScorer,
    evaluator: Evaluator,
}

impl PreferenceEngine {
    /// Build an engine, opening the registry the configuration points at.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn BehaviorStore>,
        catalog: Arc<dyn Catalog>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = match &config.registry.directory {
            Some(directory) => {
                let storage_config = StorageConfig {
                    sync_writes: config.registry.sync_writes,
                    ..StorageConfig::default()
                };
                let storage: Arc<dyn Storage> =
                    Arc::new(FileStorage::new(directory, storage_config)?);
                info!("using model registry at {}", directory.display());
                ModelRegistry::open(storage)?
            }
            None => ModelRegistry::in_memory(),
        };

        Ok(Self::with_registry(config, store, catalog, Arc::new(registry)))
    }

    /// Build an engine over an existing registry.
    pub fn with_registry(
        config: EngineConfig,
        store: Arc<dyn BehaviorStore>,
        catalog: Arc<dyn Catalog>,
        registry: Arc<ModelRegistry>,
    ) -> Self {
        let extractor = Arc::new(FeatureExtractor::new(
            store,
            catalog,
            config.features.clone(),
        ));

        Self {
            trainer: Trainer::new(Arc::clone(&extractor), Arc::clone(&registry)),
            scorer: RecommendationScorer::new(Arc::clone(&extractor), Arc::clone(&registry)),
            evaluator: Evaluator::new(extractor, Arc::clone(&registry))
                .with_sample_limit(config.evaluation_sample_limit),
            registry,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Train with `config`, or the engine's training configuration.
    pub fn train_now(&self, config: Option<&TrainingConfig>) -> Result<TrainingReport> {
        self.trainer
            .train_model(config.unwrap_or(&self.config.training))
    }

    /// Train on caller-supplied examples.
    pub fn train_on_examples(
        &self,
        config: Option<&TrainingConfig>,
        examples: Vec<TrainingExample>,
    ) -> Result<TrainingReport> {
        self.trainer
            .train_on_examples(config.unwrap_or(&self.config.training), examples)
    }

    /// Train a candidate and promote it only if it does not validate worse.
    pub fn retrain(&self, config: Option<&TrainingConfig>) -> Result<RetrainOutcome> {
        self.trainer
            .retrain(config.unwrap_or(&self.config.training))
    }

    pub fn evaluate(&self, model_id: Option<ModelId>) -> Result<EvaluationReport> {
        self.evaluator.test_model(model_id, None)
    }

    pub fn evaluate_on(
        &self,
        model_id: Option<ModelId>,
        examples: Vec<TrainingExample>,
    ) -> Result<EvaluationReport> {
        self.evaluator.test_model(model_id, Some(examples))
    }

    pub fn recommend(&self, request: &RecommendationRequest) -> Result<Vec<ScoredCandidate>> {
        Ok(self.rank(request)?.candidates)
    }

    /// Like [`recommend`](Self::recommend), also reporting which model scored
    /// the candidates.
    pub fn rank(&self, request: &RecommendationRequest) -> Result<Recommendations> {
        self.scorer.recommend(request)
    }

    pub fn model_history(&self, limit: Option<usize>) -> Vec<RunSummary> {
        self.registry.history(limit)
    }

    pub fn cleanup_models(&self, keep: usize) -> Result<usize> {
        self.registry.cleanup(keep)
    }
}
