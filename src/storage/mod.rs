//! Storage abstraction layer for persisted models.
//!
//! Backends store named blobs. The registry writes every run to a temporary
//! file and renames it into place, so readers never observe a partial run.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::*;
pub use memory::*;
pub use traits::*;
