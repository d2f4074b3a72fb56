#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use prefnet::behavior::BehaviorStore;
use prefnet::prelude::*;

pub const USERS: u64 = 10;
pub const ITEMS_PER_CATEGORY: u64 = 10;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

/// Items 0..10 are "garden", 10..20 are "kitchen".
pub fn catalog() -> Vec<ItemAttributes> {
    (0..2 * ITEMS_PER_CATEGORY)
        .map(|id| {
            let (category, price, tag) = if id < ITEMS_PER_CATEGORY {
                ("garden", 15.0 + id as f64, "outdoor")
            } else {
                ("kitchen", 80.0 + id as f64, "indoor")
            };
            ItemAttributes::new(id)
                .with_category(category)
                .with_price(price)
                .with_tags([tag])
        })
        .collect()
}

/// Every user views and then buys each item of their favourite category, and
/// only glances at the items of the other one.
pub fn events() -> Vec<BehaviorEvent> {
    let mut events = Vec::new();
    for user in 0..USERS {
        let favourite = if user % 2 == 0 { 0 } else { ITEMS_PER_CATEGORY };
        let other = ITEMS_PER_CATEGORY - favourite;
        let base = now() - Duration::days(30) + Duration::hours(user as i64);

        for offset in 0..ITEMS_PER_CATEGORY {
            let t = base + Duration::hours(4 * offset as i64);
            events.push(BehaviorEvent::new(user, favourite + offset, EventType::View, t));
            events.push(BehaviorEvent::new(
                user,
                favourite + offset,
                EventType::Purchase,
                t + Duration::minutes(30),
            ));
            events.push(BehaviorEvent::new(
                user,
                other + offset,
                EventType::View,
                t + Duration::hours(1),
            ));
        }
    }
    events
}

pub fn store() -> Arc<MemoryBehaviorStore> {
    Arc::new(MemoryBehaviorStore::with_events(events()))
}

pub fn memory_catalog() -> Arc<MemoryCatalog> {
    Arc::new(MemoryCatalog::with_items(catalog()))
}

pub fn training_config() -> TrainingConfig {
    TrainingConfig {
        hidden_layers: vec![4],
        learning_rate: 0.5,
        epochs: 100,
        validation_split: 0.2,
        ..TrainingConfig::default()
    }
}

/// The synthetic log behind a switch that makes every read fail.
pub struct SwitchableStore {
    inner: MemoryBehaviorStore,
    down: AtomicBool,
}

impl SwitchableStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryBehaviorStore::with_events(events()),
            down: AtomicBool::new(false),
        })
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(PrefnetError::upstream("behavior store offline"));
        }
        Ok(())
    }
}

impl BehaviorStore for SwitchableStore {
    fn events_for_user(&self, user_id: UserId) -> Result<Vec<BehaviorEvent>> {
        self.check()?;
        self.inner.events_for_user(user_id)
    }

    fn events_for_item(&self, item_id: ItemId) -> Result<Vec<BehaviorEvent>> {
        self.check()?;
        self.inner.events_for_item(item_id)
    }

    fn recent_events(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<BehaviorEvent>> {
        self.check()?;
        self.inner.recent_events(since, limit)
    }
}
