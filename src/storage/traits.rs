//! Storage abstraction trait and common types.

use std::io::{Read, Write};

use crate::error::{PrefnetError, Result};

/// A trait for storage backends that can store and retrieve named blobs.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open a file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create a file for writing, truncating any previous content.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Delete a file. Deleting a missing file is not an error.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all file names, sorted.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Rename a file, replacing the destination if it exists.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Create a temporary file whose name starts with `prefix` and ends in `.tmp`.
    fn create_temp_output(&self, prefix: &str) -> Result<(String, Box<dyn StorageOutput>)>;

    /// Sync all pending writes to storage.
    fn sync(&self) -> Result<()>;

    /// Read a whole file into memory.
    fn read_all(&self, name: &str) -> Result<Vec<u8>> {
        let mut input = self.open_input(name)?;
        let mut buffer = Vec::with_capacity(input.size()? as usize);
        input.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// Write `data` to `name` through a temporary file and a rename.
    ///
    /// The temporary file is removed if any step fails.
    fn write_atomic(&self, name: &str, data: &[u8]) -> Result<()> {
        let (temp_name, mut output) = self.create_temp_output(name)?;
        let written = output
            .write_all(data)
            .map_err(PrefnetError::from)
            .and_then(|_| output.close());
        drop(output);

        if let Err(e) = written.and_then(|_| self.rename_file(&temp_name, name)) {
            let _ = self.delete_file(&temp_name);
            return Err(e);
        }
        Ok(())
    }
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Send + std::fmt::Debug {
    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Close the output stream, making its content visible under its name.
    fn close(&mut self) -> Result<()>;
}

/// Configuration for storage backends.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Buffer size for I/O operations.
    pub buffer_size: usize,

    /// Whether to fsync every closed output.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            buffer_size: 65536,
            sync_writes: true,
        }
    }
}

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// File not found.
    FileNotFound(String),

    /// I/O error.
    IoError(String),

    /// Stored content failed an integrity check.
    Corrupted(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
            StorageError::Corrupted(msg) => write!(f, "Corrupted file: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for PrefnetError {
    fn from(err: StorageError) -> Self {
        PrefnetError::storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();

        assert_eq!(config.buffer_size, 65536);
        assert!(config.sync_writes);
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FileNotFound("run.json".to_string());
        assert_eq!(err.to_string(), "File not found: run.json");

        let err = StorageError::IoError("disk full".to_string());
        assert_eq!(err.to_string(), "I/O error: disk full");

        let err = StorageError::Corrupted("run.json: checksum mismatch".to_string());
        assert_eq!(err.to_string(), "Corrupted file: run.json: checksum mismatch");
    }

    #[test]
    fn test_storage_error_converts() {
        let err: PrefnetError = StorageError::FileNotFound("a".to_string()).into();
        assert!(matches!(err, PrefnetError::Storage(ref msg) if msg == "File not found: a"));
    }
}
