//! Scoring and ranking of candidate items for a user.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::behavior::{ItemId, UserId};
use crate::error::{PrefnetError, Result};
use crate::features::FeatureExtractor;
use crate::registry::ModelRegistry;
use crate::run::{ModelId, TrainingRun};

/// A candidate item with the model's engagement score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub item_id: ItemId,
    pub predicted_score: f64,
}

/// A request for ranked recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: UserId,
    pub candidate_item_ids: Vec<ItemId>,
    /// Return at most this many candidates; all of them when absent.
    #[serde(default)]
    pub top_n: Option<usize>,
    /// Drop candidates scoring below this value, in [0, 1].
    #[serde(default)]
    pub min_score: Option<f64>,
    /// Point in time features are computed at; now when absent.
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

impl RecommendationRequest {
    pub fn new(user_id: UserId, candidate_item_ids: Vec<ItemId>) -> Self {
        Self {
            user_id,
            candidate_item_ids,
            top_n: None,
            min_score: None,
            as_of: None,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(min_score) = self.min_score
            && !(0.0..=1.0).contains(&min_score)
        {
            return Err(PrefnetError::invalid_config(
                "min_score",
                format!("must be within [0, 1], got {min_score}"),
            ));
        }
        Ok(())
    }
}

/// Ranked candidates and the model that scored them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub model_id: ModelId,
    pub candidates: Vec<ScoredCandidate>,
}

/// Ranks candidates with the current model.
pub struct RecommendationScorer {
    extractor: Arc<FeatureExtractor>,
    registry: Arc<ModelRegistry>,
}

impl RecommendationScorer {
    pub fn new(extractor: Arc<FeatureExtractor>, registry: Arc<ModelRegistry>) -> Self {
        Self {
            extractor,
            registry,
        }
    }

    /// Score every distinct candidate and sort by descending score, ties by
    /// ascending item id.
    ///
    /// The whole request uses one model snapshot. Any unknown candidate or
    /// upstream failure fails the request; there are no partial results.
    pub fn score_candidates(
        &self,
        user_id: UserId,
        candidate_item_ids: &[ItemId],
        as_of: DateTime<Utc>,
    ) -> Result<Vec<ScoredCandidate>> {
        let run = self.registry.get_current()?;
        self.score_with(&run, user_id, candidate_item_ids, as_of)
    }

    /// Rank the request's candidates, drop those under `min_score`, then keep
    /// the `top_n` best.
    pub fn recommend(&self, request: &RecommendationRequest) -> Result<Recommendations> {
        request.validate()?;

        let run = self.registry.get_current()?;
        let mut candidates = self.score_with(
            &run,
            request.user_id,
            &request.candidate_item_ids,
            request.as_of.unwrap_or_else(Utc::now),
        )?;
        if let Some(min_score) = request.min_score {
            candidates.retain(|c| c.predicted_score >= min_score);
        }
        if let Some(n) = request.top_n {
            candidates.truncate(n);
        }

        Ok(Recommendations {
            model_id: run.id,
            candidates,
        })
    }

    fn score_with(
        &self,
        run: &TrainingRun,
        user_id: UserId,
        candidate_item_ids: &[ItemId],
        as_of: DateTime<Utc>,
    ) -> Result<Vec<ScoredCandidate>> {
        run.ensure_compatible(&self.extractor)?;

        let mut seen = HashSet::with_capacity(candidate_item_ids.len());
        let unique: Vec<ItemId> = candidate_item_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.extractor.extract_batch(user_id, &unique, as_of)?;
        let mut scored = vectors
            .par_iter()
            .map(|(item_id, features)| {
                run.predict(features).map(|predicted_score| ScoredCandidate {
                    item_id: *item_id,
                    predicted_score,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        scored.sort_by(|a, b| {
            b.predicted_score
                .partial_cmp(&a.predicted_score)
                .unwrap_or(Ordering::Equal)
                .then(a.item_id.cmp(&b.item_id))
        });

        debug!(
            "scored {} candidates for user {user_id} with model {}",
            scored.len(),
            run.id
        );
        Ok(scored)
    }
}
