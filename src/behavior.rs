//! Behavior events and the read-only collaborators that supply them.
//!
//! The engine never writes behavior data. It reads interaction events from a
//! [`BehaviorStore`] and item attributes from a [`Catalog`]; both are traits so
//! the backing database stays an external concern. In-memory implementations
//! and JSON file loaders live in the submodules.

pub mod loader;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use loader::{load_catalog_json, load_events_jsonl};
pub use memory::{MemoryBehaviorStore, MemoryCatalog};

/// User identifier.
pub type UserId = u64;

/// Catalog item identifier.
pub type ItemId = u64;

/// Kind of interaction a user had with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The user looked at the item.
    View,
    /// The user added the item to the cart.
    CartAdd,
    /// The user bought the item.
    Purchase,
    /// The user put the item on a wishlist.
    Wishlist,
    /// The user removed the item from the wishlist or cart.
    Remove,
}

impl EventType {
    /// All event types, in feature order.
    pub const ALL: [EventType; 5] = [
        EventType::View,
        EventType::CartAdd,
        EventType::Purchase,
        EventType::Wishlist,
        EventType::Remove,
    ];

    /// Position of this event type in the per-type feature block.
    pub fn index(self) -> usize {
        match self {
            EventType::View => 0,
            EventType::CartAdd => 1,
            EventType::Purchase => 2,
            EventType::Wishlist => 3,
            EventType::Remove => 4,
        }
    }

    /// Whether the event expresses interest in the item.
    pub fn is_engagement(self) -> bool {
        !matches!(self, EventType::Remove)
    }
}

/// Optional context recorded with an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// Browsing session identifier.
    pub session_id: Option<String>,
    /// Page the event originated from.
    pub source_page: Option<String>,
}

/// A single user/item interaction. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// Explicit 1-5 rating attached to the event, if any.
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub context: Option<EventContext>,
}

impl BehaviorEvent {
    /// Create an event without rating or context.
    pub fn new(
        user_id: UserId,
        item_id: ItemId,
        event_type: EventType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            item_id,
            event_type,
            timestamp,
            rating: None,
            context: None,
        }
    }

    /// Attach an explicit rating.
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Attach event context.
    pub fn with_context(mut self, context: EventContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Static attributes of a catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAttributes {
    pub item_id: ItemId,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ItemAttributes {
    /// Create an item with no attributes set.
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            category: None,
            price: None,
            tags: Vec::new(),
        }
    }

    pub fn with_category<S: Into<String>>(mut self, category: S) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Read-only access to the durable interaction log.
///
/// Implementations report read failures as
/// [`PrefnetError::UpstreamUnavailable`](crate::error::PrefnetError::UpstreamUnavailable).
pub trait BehaviorStore: Send + Sync {
    /// All events of one user, in any order.
    fn events_for_user(&self, user_id: UserId) -> Result<Vec<BehaviorEvent>>;

    /// All events touching one item, in any order.
    fn events_for_item(&self, item_id: ItemId) -> Result<Vec<BehaviorEvent>>;

    /// Events at or after `since` (all events when `None`), newest first,
    /// capped at `limit` when given.
    fn recent_events(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<BehaviorEvent>>;
}

/// Read-only access to item attributes.
pub trait Catalog: Send + Sync {
    /// Attributes of one item, `None` when the item does not exist.
    fn item(&self, item_id: ItemId) -> Result<Option<ItemAttributes>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_serde_names() {
        let json = serde_json::to_string(&EventType::CartAdd).unwrap();
        assert_eq!(json, "\"cart_add\"");

        let parsed: EventType = serde_json::from_str("\"wishlist\"").unwrap();
        assert_eq!(parsed, EventType::Wishlist);
    }

    #[test]
    fn test_event_type_indices_are_distinct() {
        let mut seen: Vec<usize> = EventType::ALL.iter().map(|e| e.index()).collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(!EventType::Remove.is_engagement());
        assert!(EventType::View.is_engagement());
    }

    #[test]
    fn test_event_parses_without_optional_fields() {
        let line = r#"{"user_id":1,"item_id":7,"event_type":"purchase","timestamp":"2024-05-01T10:00:00Z"}"#;
        let event: BehaviorEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.user_id, 1);
        assert_eq!(event.item_id, 7);
        assert_eq!(event.event_type, EventType::Purchase);
        assert!(event.rating.is_none());
        assert!(event.context.is_none());
    }
}
