//! Error types for the prefnet library.
//!
//! Every fallible operation returns [`Result`], whose error side is the
//! [`PrefnetError`] enum. Failures are always scoped to the training run or
//! scoring request that produced them; nothing here is fatal to the process.
//!
//! # Examples
//!
//! ```
//! use prefnet::error::{PrefnetError, Result};
//!
//! fn check_epochs(epochs: usize) -> Result<()> {
//!     if epochs == 0 {
//!         return Err(PrefnetError::invalid_config("epochs", "must be greater than 0"));
//!     }
//!     Ok(())
//! }
//!
//! match check_epochs(0) {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for prefnet operations.
#[derive(Error, Debug)]
pub enum PrefnetError {
    /// Malformed hyperparameters or split ratios, caught before any data access.
    #[error("Invalid configuration: {field}: {message}")]
    InvalidConfiguration { field: String, message: String },

    /// Fewer usable examples than the training floor.
    #[error("Insufficient training data: need at least {required} samples, got {actual}")]
    InsufficientData { actual: usize, required: usize },

    /// A requested user, item or model does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No model has ever been registered.
    #[error("No model available: train a model first")]
    NoModelAvailable,

    /// The model's input size disagrees with the live feature vectors.
    #[error("Model dimension mismatch: model expects {expected} features, extractor produces {actual}")]
    ModelDimensionMismatch { expected: usize, actual: usize },

    /// The model was trained on a different feature layout than the extractor produces.
    #[error("Feature schema mismatch: model uses schema version {expected}, extractor produces version {actual}")]
    SchemaMismatch { expected: u32, actual: u32 },

    /// The behavior store or catalog could not be read.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors (file operations, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with PrefnetError.
pub type Result<T> = std::result::Result<T, PrefnetError>;

impl PrefnetError {
    /// Create a new invalid configuration error naming the offending field.
    pub fn invalid_config<F: Into<String>, S: Into<String>>(field: F, msg: S) -> Self {
        PrefnetError::InvalidConfiguration {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create a new insufficient data error.
    pub fn insufficient_data(actual: usize, required: usize) -> Self {
        PrefnetError::InsufficientData { actual, required }
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        PrefnetError::NotFound(msg.into())
    }

    /// Create a new dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        PrefnetError::ModelDimensionMismatch { expected, actual }
    }

    /// Create a new feature schema mismatch error.
    pub fn schema_mismatch(expected: u32, actual: u32) -> Self {
        PrefnetError::SchemaMismatch { expected, actual }
    }

    /// Create a new upstream error.
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        PrefnetError::UpstreamUnavailable(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        PrefnetError::Storage(msg.into())
    }
}
