//! # prefnet
//!
//! Behavior-driven preference prediction for e-commerce catalogs.
//!
//! Implicit signals (views, cart adds, purchases, wishlist actions) are turned
//! into fixed-size feature vectors, a small feed-forward network is trained on
//! them with stochastic gradient descent, and the resulting models are
//! versioned in a registry and used to rank candidate items for a user.
//!
//! ## Components
//!
//! - [`behavior`]: event log and catalog interfaces with in-memory backends
//! - [`features`]: feature extraction and label policy
//! - [`dataset`]: example collection and train/validation split
//! - [`network`]: the neural network, activations and loss
//! - [`trainer`]: the training loop and retrain promotion guard
//! - [`registry`]: persisted, versioned training runs
//! - [`scorer`] and [`evaluator`]: serving and auditing models
//! - [`engine`]: one facade over all of the above

pub mod behavior;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod features;
pub mod network;
pub mod registry;
pub mod run;
pub mod scorer;
pub mod storage;
pub mod trainer;

pub mod prelude {
    pub use crate::behavior::{
        BehaviorEvent, BehaviorStore, Catalog, EventType, ItemAttributes, ItemId,
        MemoryBehaviorStore, MemoryCatalog, UserId,
    };
    pub use crate::config::EngineConfig;
    pub use crate::engine::{PreferenceEngine, RecommendationRequest};
    pub use crate::error::{PrefnetError, Result};
    pub use crate::network::Activation;
    pub use crate::scorer::ScoredCandidate;
    pub use crate::trainer::{StoppingPolicy, TrainingConfig, TrainingReport};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
