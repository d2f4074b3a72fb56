//! Training example collection and train/validation partitioning.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::behavior::{ItemId, UserId};
use crate::error::{PrefnetError, Result};
use crate::features::{FEATURE_NAMES, FeatureExtractor, FeatureVector, label_for};

/// A labeled feature vector for one user/item pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub features: FeatureVector,
    /// Engagement strength in [0, 1].
    pub label: f64,
}

impl TrainingExample {
    /// Create an example, clamping the label into [0, 1].
    pub fn new(user_id: UserId, item_id: ItemId, features: FeatureVector, label: f64) -> Self {
        Self {
            user_id,
            item_id,
            features,
            label: label.clamp(0.0, 1.0),
        }
    }

    /// Fail when a feature value or the label is NaN or infinite.
    pub fn ensure_finite(&self) -> Result<()> {
        if let Some(index) = self.features.iter().position(|value| !value.is_finite()) {
            let name = FEATURE_NAMES.get(index).copied().unwrap_or("unnamed");
            return Err(PrefnetError::invalid_config(
                "features",
                format!(
                    "non-finite value {} at index {index} ({name}) for user {} item {}",
                    self.features[index], self.user_id, self.item_id
                ),
            ));
        }
        if !self.label.is_finite() {
            return Err(PrefnetError::invalid_config(
                "label",
                format!(
                    "non-finite label {} for user {} item {}",
                    self.label, self.user_id, self.item_id
                ),
            ));
        }
        Ok(())
    }
}

/// Pulls labeled examples out of the behavior store.
pub struct TrainingSetBuilder<'a> {
    extractor: &'a FeatureExtractor,
}

impl<'a> TrainingSetBuilder<'a> {
    pub fn new(extractor: &'a FeatureExtractor) -> Self {
        Self { extractor }
    }

    /// Collect up to `limit` examples from events at or after `since`.
    ///
    /// Events are visited newest first and each user/item pair yields one
    /// example, labeled by its most recent event and featurized as of that
    /// event's timestamp. Pairs whose item left the catalog are skipped.
    pub fn collect_examples(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TrainingExample>> {
        let events = self.extractor.store().recent_events(since, None)?;

        let mut seen: HashSet<(UserId, ItemId)> = HashSet::new();
        let mut examples = Vec::with_capacity(limit.min(events.len()));
        let mut skipped = 0usize;

        for event in &events {
            if examples.len() >= limit {
                break;
            }
            if !seen.insert((event.user_id, event.item_id)) {
                continue;
            }

            match self
                .extractor
                .extract(event.user_id, event.item_id, event.timestamp)
            {
                Ok(features) => examples.push(TrainingExample::new(
                    event.user_id,
                    event.item_id,
                    features,
                    label_for(event),
                )),
                Err(PrefnetError::NotFound(what)) => {
                    debug!("skipping pair ({}, {}): {what} not found", event.user_id, event.item_id);
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            "collected {} examples from {} events ({} pairs skipped)",
            examples.len(),
            events.len(),
            skipped
        );
        Ok(examples)
    }
}

/// Shuffle `examples` with a seeded generator and cut them into a training and
/// a validation set at `round(len * (1 - validation_split))`.
///
/// Every example lands in exactly one of the two sets.
pub fn build_training_set<T>(
    mut examples: Vec<T>,
    validation_split: f64,
    seed: u64,
) -> Result<(Vec<T>, Vec<T>)> {
    validate_split(validation_split)?;

    let mut rng = StdRng::seed_from_u64(seed);
    examples.shuffle(&mut rng);

    let cut = (examples.len() as f64 * (1.0 - validation_split)).round() as usize;
    let validation = examples.split_off(cut.min(examples.len()));
    Ok((examples, validation))
}

/// Fails unless `0 < validation_split < 1`.
pub fn validate_split(validation_split: f64) -> Result<()> {
    if !(validation_split > 0.0 && validation_split < 1.0) {
        return Err(PrefnetError::invalid_config(
            "validation_split",
            format!("must be strictly between 0 and 1, got {validation_split}"),
        ));
    }
    Ok(())
}
