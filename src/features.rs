//! Feature extraction for user/item preference prediction.
//!
//! A [`FeatureExtractor`] turns a user's interaction history and an item's
//! static attributes into a fixed-length [`FeatureVector`]. Extraction is a
//! pure function of its inputs and an explicit `as_of` instant: only events
//! strictly before `as_of` are visible, and their contribution decays with a
//! configurable half-life.

pub mod normalization;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::behavior::{BehaviorEvent, BehaviorStore, Catalog, EventType, ItemAttributes, ItemId, UserId};
use crate::error::{PrefnetError, Result};

pub use normalization::FeatureNormalization;

/// Ordered feature values of one user/item pair.
pub type FeatureVector = Vec<f64>;

/// Layout version of [`FEATURE_NAMES`]. Bump whenever the layout changes.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Feature names in vector order.
pub const FEATURE_NAMES: [&str; 12] = [
    "pair_view",
    "pair_cart",
    "pair_purchase",
    "pair_wishlist",
    "pair_remove",
    "category_affinity",
    "price_tier",
    "price_fit",
    "tag_overlap",
    "user_activity",
    "item_popularity",
    "prior_engagement",
];

const CATEGORY_AFFINITY: usize = 5;
const PRICE_TIER: usize = 6;
const PRICE_FIT: usize = 7;
const TAG_OVERLAP: usize = 8;
const USER_ACTIVITY: usize = 9;
const ITEM_POPULARITY: usize = 10;
const PRIOR_ENGAGEMENT: usize = 11;

/// Scale at which activity and popularity counts reach 0.5.
const COUNT_SCALE: f64 = 5.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Configuration for feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Age in days at which an event counts half as much as a fresh one.
    pub half_life_days: f64,
    /// Ascending price boundaries separating price tiers.
    pub price_tier_bounds: Vec<f64>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            half_life_days: 14.0,
            price_tier_bounds: vec![25.0, 50.0, 100.0, 250.0],
        }
    }
}

impl FeatureConfig {
    /// Check the configuration, naming the offending field on failure.
    pub fn validate(&self) -> Result<()> {
        if !(self.half_life_days.is_finite() && self.half_life_days > 0.0) {
            return Err(PrefnetError::invalid_config(
                "half_life_days",
                format!("must be a positive number, got {}", self.half_life_days),
            ));
        }
        if self
            .price_tier_bounds
            .windows(2)
            .any(|pair| pair[0] >= pair[1])
        {
            return Err(PrefnetError::invalid_config(
                "price_tier_bounds",
                "must be strictly ascending",
            ));
        }
        Ok(())
    }
}

/// Engagement label of a single event, in [0, 1].
///
/// Purchases are the strongest signal, removals the weakest. An explicit
/// 1-5 rating overrides the event type.
pub fn label_for(event: &BehaviorEvent) -> f64 {
    if let Some(rating) = event.rating {
        return ((rating - 1.0) / 4.0).clamp(0.0, 1.0);
    }
    match event.event_type {
        EventType::Purchase => 1.0,
        EventType::Wishlist => 0.8,
        EventType::CartAdd => 0.7,
        EventType::View => 0.3,
        EventType::Remove => 0.1,
    }
}

/// Everything [`FeatureExtractor::compute`] needs, already fetched.
#[derive(Debug, Clone, Copy)]
pub struct FeatureInputs<'a> {
    /// All events of the user.
    pub user_history: &'a [BehaviorEvent],
    /// All events touching the target item.
    pub item_history: &'a [BehaviorEvent],
    /// The target item.
    pub item: &'a ItemAttributes,
    /// Attributes of the items in the user's history.
    pub history_items: &'a HashMap<ItemId, ItemAttributes>,
}

/// Builds feature vectors from behavior history and catalog attributes.
pub struct FeatureExtractor {
    store: Arc<dyn BehaviorStore>,
    catalog: Arc<dyn Catalog>,
    config: FeatureConfig,
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("config", &self.config)
            .finish()
    }
}

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new(
        store: Arc<dyn BehaviorStore>,
        catalog: Arc<dyn Catalog>,
        config: FeatureConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            config,
        }
    }

    /// Dimensionality of every vector this extractor produces.
    pub fn dimension(&self) -> usize {
        FEATURE_NAMES.len()
    }

    /// Layout version of the produced vectors.
    pub fn schema_version(&self) -> u32 {
        FEATURE_SCHEMA_VERSION
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn BehaviorStore> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Extract the feature vector of one user/item pair as of `as_of`.
    ///
    /// Fails with `NotFound` when the user has no events at all or the item is
    /// not in the catalog.
    pub fn extract(&self, user_id: UserId, item_id: ItemId, as_of: DateTime<Utc>) -> Result<FeatureVector> {
        let user_history = self.user_history(user_id)?;
        let history_items = self.history_items(&user_history)?;
        self.extract_with_history(&user_history, &history_items, item_id, as_of)
    }

    /// Extract vectors for many items of one user, reading the user's history once.
    pub fn extract_batch(
        &self,
        user_id: UserId,
        item_ids: &[ItemId],
        as_of: DateTime<Utc>,
    ) -> Result<Vec<(ItemId, FeatureVector)>> {
        let user_history = self.user_history(user_id)?;
        let history_items = self.history_items(&user_history)?;

        item_ids
            .iter()
            .map(|&item_id| {
                self.extract_with_history(&user_history, &history_items, item_id, as_of)
                    .map(|features| (item_id, features))
            })
            .collect()
    }

    fn extract_with_history(
        &self,
        user_history: &[BehaviorEvent],
        history_items: &HashMap<ItemId, ItemAttributes>,
        item_id: ItemId,
        as_of: DateTime<Utc>,
    ) -> Result<FeatureVector> {
        let item = self
            .catalog
            .item(item_id)?
            .ok_or_else(|| PrefnetError::not_found(format!("item {item_id}")))?;
        let item_history = self.store.events_for_item(item_id)?;

        Ok(self.compute(
            &FeatureInputs {
                user_history,
                item_history: &item_history,
                item: &item,
                history_items,
            },
            as_of,
        ))
    }

    fn user_history(&self, user_id: UserId) -> Result<Vec<BehaviorEvent>> {
        let history = self.store.events_for_user(user_id)?;
        if history.is_empty() {
            return Err(PrefnetError::not_found(format!("user {user_id}")));
        }
        Ok(history)
    }

    fn history_items(&self, history: &[BehaviorEvent]) -> Result<HashMap<ItemId, ItemAttributes>> {
        let ids: BTreeSet<ItemId> = history.iter().map(|event| event.item_id).collect();
        let mut items = HashMap::with_capacity(ids.len());
        for item_id in ids {
            // Items that left the catalog simply contribute no attributes.
            if let Some(item) = self.catalog.item(item_id)? {
                items.insert(item_id, item);
            }
        }
        Ok(items)
    }

    /// Compute the feature vector from pre-fetched inputs.
    ///
    /// Bit-identical for identical inputs: events are put in a canonical order
    /// before any floating point accumulation.
    pub fn compute(&self, inputs: &FeatureInputs<'_>, as_of: DateTime<Utc>) -> FeatureVector {
        let mut features = vec![0.0; FEATURE_NAMES.len()];
        let item = inputs.item;

        let history = visible_events(inputs.user_history, as_of);
        let weights: Vec<f64> = history
            .iter()
            .map(|event| self.recency_weight(event.timestamp, as_of))
            .collect();

        // Per-type counts on this exact pair.
        let mut pair_counts = [0.0; 5];
        for (event, weight) in history.iter().zip(&weights) {
            if event.item_id == item.item_id {
                pair_counts[event.event_type.index()] += weight;
            }
        }
        for (slot, count) in pair_counts.iter().enumerate() {
            features[slot] = squash(*count, 1.0);
        }

        let mut engaged_total = 0.0;
        let mut engaged_in_category = 0.0;
        let mut price_weight = 0.0;
        let mut price_sum = 0.0;
        let mut user_tags: BTreeSet<&str> = BTreeSet::new();
        let mut activity = 0.0;
        let mut label_sum = 0.0;

        for (event, &weight) in history.iter().zip(&weights) {
            activity += weight;
            label_sum += weight * label_for(event);

            if !event.event_type.is_engagement() {
                continue;
            }
            engaged_total += weight;

            let Some(attrs) = inputs.history_items.get(&event.item_id) else {
                continue;
            };
            if item.category.is_some() && attrs.category == item.category {
                engaged_in_category += weight;
            }
            if let Some(price) = attrs.price {
                price_weight += weight;
                price_sum += weight * price;
            }
            user_tags.extend(attrs.tags.iter().map(String::as_str));
        }

        if engaged_total > 0.0 {
            features[CATEGORY_AFFINITY] = engaged_in_category / engaged_total;
        }

        if let Some(price) = item.price {
            features[PRICE_TIER] = self.price_tier(price);
            if price_weight > 0.0 {
                features[PRICE_FIT] = price_fit(price, price_sum / price_weight);
            }
        }

        let item_tags: BTreeSet<&str> = item.tags.iter().map(String::as_str).collect();
        let union = user_tags.union(&item_tags).count();
        if union > 0 {
            features[TAG_OVERLAP] = user_tags.intersection(&item_tags).count() as f64 / union as f64;
        }

        features[USER_ACTIVITY] = squash(activity, COUNT_SCALE);

        let engaged_users: BTreeSet<UserId> = inputs
            .item_history
            .iter()
            .filter(|event| event.timestamp < as_of && event.event_type.is_engagement())
            .map(|event| event.user_id)
            .collect();
        features[ITEM_POPULARITY] = squash(engaged_users.len() as f64, COUNT_SCALE);

        if activity > 0.0 {
            features[PRIOR_ENGAGEMENT] = label_sum / activity;
        }

        features
    }

    /// Exponential decay by event age; `1.0` for an event at `as_of`.
    fn recency_weight(&self, timestamp: DateTime<Utc>, as_of: DateTime<Utc>) -> f64 {
        let age_days = (as_of - timestamp).num_seconds().max(0) as f64 / SECONDS_PER_DAY;
        0.5_f64.powf(age_days / self.config.half_life_days)
    }

    fn price_tier(&self, price: f64) -> f64 {
        let bounds = &self.config.price_tier_bounds;
        if bounds.is_empty() {
            return 0.0;
        }
        let tier = bounds.iter().filter(|&&bound| price >= bound).count();
        tier as f64 / bounds.len() as f64
    }
}

/// Events strictly before `as_of`, in canonical order.
fn visible_events(history: &[BehaviorEvent], as_of: DateTime<Utc>) -> Vec<&BehaviorEvent> {
    let mut visible: Vec<&BehaviorEvent> = history
        .iter()
        .filter(|event| event.timestamp < as_of)
        .collect();
    visible.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.item_id.cmp(&b.item_id))
            .then(a.event_type.index().cmp(&b.event_type.index()))
            .then(a.rating.partial_cmp(&b.rating).unwrap_or(std::cmp::Ordering::Equal))
    });
    visible
}

/// Map a non-negative count into [0, 1), reaching 0.5 at `scale`.
fn squash(value: f64, scale: f64) -> f64 {
    value / (value + scale)
}

fn price_fit(price: f64, preferred: f64) -> f64 {
    let largest = price.abs().max(preferred.abs());
    if largest == 0.0 {
        return 1.0;
    }
    (1.0 - (price - preferred).abs() / largest).clamp(0.0, 1.0)
}
