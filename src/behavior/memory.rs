//! In-memory behavior store and catalog for tests, demos and the CLI.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::behavior::{BehaviorEvent, BehaviorStore, Catalog, ItemAttributes, ItemId, UserId};
use crate::error::Result;

/// An append-only event log held in memory.
#[derive(Debug, Default)]
pub struct MemoryBehaviorStore {
    events: RwLock<Vec<BehaviorEvent>>,
}

impl MemoryBehaviorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with events.
    pub fn with_events(events: Vec<BehaviorEvent>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }

    /// Append one event to the log.
    pub fn append(&self, event: BehaviorEvent) {
        self.events.write().push(event);
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl BehaviorStore for MemoryBehaviorStore {
    fn events_for_user(&self, user_id: UserId) -> Result<Vec<BehaviorEvent>> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|event| event.user_id == user_id)
            .cloned()
            .collect())
    }

    fn events_for_item(&self, item_id: ItemId) -> Result<Vec<BehaviorEvent>> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|event| event.item_id == item_id)
            .cloned()
            .collect())
    }

    fn recent_events(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<BehaviorEvent>> {
        let guard = self.events.read();
        let mut events: Vec<BehaviorEvent> = guard
            .iter()
            .filter(|event| since.is_none_or(|cutoff| event.timestamp >= cutoff))
            .cloned()
            .collect();
        drop(guard);

        // Newest first; equal timestamps keep a stable, id-based order.
        events.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(a.user_id.cmp(&b.user_id))
                .then(a.item_id.cmp(&b.item_id))
        });
        if let Some(limit) = limit {
            events.truncate(limit);
        }
        Ok(events)
    }
}

/// Item attributes keyed by item id.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: RwLock<HashMap<ItemId, ItemAttributes>>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog preloaded with items.
    pub fn with_items<I: IntoIterator<Item = ItemAttributes>>(items: I) -> Self {
        let catalog = Self::new();
        for item in items {
            catalog.insert(item);
        }
        catalog
    }

    /// Insert or replace an item.
    pub fn insert(&self, item: ItemAttributes) {
        self.items.write().insert(item.item_id, item);
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl Catalog for MemoryCatalog {
    fn item(&self, item_id: ItemId) -> Result<Option<ItemAttributes>> {
        Ok(self.items.read().get(&item_id).cloned())
    }
}
