//! Versioned store of training runs with an atomically swapped current model.
//!
//! Each run is persisted as one JSON envelope `run-<id>.json` holding the
//! serialized run, its CRC32 checksum and the save sequence. Saving writes
//! the envelope through a temporary file before the in-memory pointer moves,
//! so a failed write leaves the current model untouched.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{PrefnetError, Result};
use crate::run::{ModelId, RunSummary, TrainingRun};
use crate::storage::{MemoryStorage, Storage, StorageError};

const RUN_FILE_PREFIX: &str = "run-";
const RUN_FILE_SUFFIX: &str = ".json";
const ENVELOPE_FORMAT_VERSION: u32 = 1;

/// On-disk wrapper around a serialized run.
#[derive(Debug, Serialize, Deserialize)]
struct RunEnvelope {
    format_version: u32,
    sequence: u64,
    checksum: u32,
    payload: String,
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    run: Arc<TrainingRun>,
    sequence: u64,
}

impl RegistryEntry {
    /// Newest first: creation time, then save sequence.
    fn newer_first(a: &Self, b: &Self) -> CmpOrdering {
        b.run
            .created_at
            .cmp(&a.run.created_at)
            .then(b.sequence.cmp(&a.sequence))
    }
}

fn file_name(id: ModelId) -> String {
    format!("{RUN_FILE_PREFIX}{id}{RUN_FILE_SUFFIX}")
}

/// Registry of persisted training runs.
#[derive(Debug)]
pub struct ModelRegistry {
    storage: Arc<dyn Storage>,
    entries: RwLock<HashMap<ModelId, RegistryEntry>>,
    current: RwLock<Option<Arc<TrainingRun>>>,
    next_sequence: AtomicU64,
    /// Serializes persist+swap so two saves cannot interleave.
    save_lock: Mutex<()>,
}

impl ModelRegistry {
    /// Open a registry over `storage`, loading every persisted run.
    ///
    /// Leftover temporary files from interrupted saves are removed. A run
    /// file that fails to parse or whose checksum does not match is an error
    /// naming the file.
    pub fn open(storage: Arc<dyn Storage>) -> Result<Self> {
        let mut entries = HashMap::new();
        let mut max_sequence = 0;

        for name in storage.list_files()? {
            if name.ends_with(".tmp") {
                warn!("removing incomplete model file {name}");
                storage.delete_file(&name)?;
                continue;
            }
            if !(name.starts_with(RUN_FILE_PREFIX) && name.ends_with(RUN_FILE_SUFFIX)) {
                continue;
            }

            let entry = Self::load_entry(storage.as_ref(), &name)?;
            max_sequence = max_sequence.max(entry.sequence);
            entries.insert(entry.run.id, entry);
        }

        let current = entries
            .values()
            .min_by(|a, b| RegistryEntry::newer_first(a, b))
            .map(|entry| Arc::clone(&entry.run));

        info!(
            "opened model registry with {} runs, current model {}",
            entries.len(),
            current
                .as_ref()
                .map_or_else(|| "none".to_string(), |run| run.id.to_string())
        );

        Ok(Self {
            storage,
            entries: RwLock::new(entries),
            current: RwLock::new(current),
            next_sequence: AtomicU64::new(max_sequence),
            save_lock: Mutex::new(()),
        })
    }

    /// An empty registry backed by memory.
    pub fn in_memory() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            entries: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            next_sequence: AtomicU64::new(0),
            save_lock: Mutex::new(()),
        }
    }

    fn load_entry(storage: &dyn Storage, name: &str) -> Result<RegistryEntry> {
        let bytes = storage.read_all(name)?;
        let envelope: RunEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::Corrupted(format!("{name}: {e}")))?;

        if envelope.format_version != ENVELOPE_FORMAT_VERSION {
            return Err(StorageError::Corrupted(format!(
                "{name}: unsupported format version {}",
                envelope.format_version
            ))
            .into());
        }
        if crc32fast::hash(envelope.payload.as_bytes()) != envelope.checksum {
            return Err(StorageError::Corrupted(format!("{name}: checksum mismatch")).into());
        }

        let run: TrainingRun = serde_json::from_str(&envelope.payload)
            .map_err(|e| StorageError::Corrupted(format!("{name}: {e}")))?;
        if file_name(run.id) != name {
            return Err(StorageError::Corrupted(format!(
                "{name}: contains model {}",
                run.id
            ))
            .into());
        }

        debug!("loaded model {} from {name}", run.id);
        Ok(RegistryEntry {
            run: Arc::new(run),
            sequence: envelope.sequence,
        })
    }

    /// Persist `run` and make it current if it is the newest run.
    pub fn save(&self, run: TrainingRun) -> Result<ModelId> {
        let _guard = self.save_lock.lock();

        let id = run.id;
        if self.entries.read().contains_key(&id) {
            return Err(PrefnetError::storage(format!("model {id} is already registered")));
        }

        let sequence = self.next_sequence.load(Ordering::SeqCst) + 1;
        let payload = serde_json::to_string(&run)?;
        let envelope = RunEnvelope {
            format_version: ENVELOPE_FORMAT_VERSION,
            sequence,
            checksum: crc32fast::hash(payload.as_bytes()),
            payload,
        };
        let bytes = serde_json::to_vec(&envelope)?;
        self.storage.write_atomic(&file_name(id), &bytes)?;
        self.storage.sync()?;
        self.next_sequence.store(sequence, Ordering::SeqCst);

        let entry = RegistryEntry {
            run: Arc::new(run),
            sequence,
        };

        let mut entries = self.entries.write();
        let is_newest = entries
            .values()
            .all(|other| RegistryEntry::newer_first(&entry, other) == CmpOrdering::Less);
        if is_newest {
            *self.current.write() = Some(Arc::clone(&entry.run));
        }
        entries.insert(id, entry);

        debug!("saved model {id} (sequence {sequence}, current: {is_newest})");
        Ok(id)
    }

    /// The current model snapshot.
    pub fn get_current(&self) -> Result<Arc<TrainingRun>> {
        self.current
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(PrefnetError::NoModelAvailable)
    }

    /// A specific run by id.
    pub fn get(&self, model_id: ModelId) -> Result<Arc<TrainingRun>> {
        self.entries
            .read()
            .get(&model_id)
            .map(|entry| Arc::clone(&entry.run))
            .ok_or_else(|| PrefnetError::not_found(format!("model {model_id}")))
    }

    /// Summaries of registered runs, newest first.
    pub fn history(&self, limit: Option<usize>) -> Vec<RunSummary> {
        self.sorted_entries()
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|entry| entry.run.summary())
            .collect()
    }

    /// Delete all but the `keep` newest runs. The current run is never deleted.
    ///
    /// Returns the number of runs removed.
    pub fn cleanup(&self, keep: usize) -> Result<usize> {
        if keep == 0 {
            return Err(PrefnetError::invalid_config("keep", "must be at least 1"));
        }

        let _guard = self.save_lock.lock();
        let current_id = self.current.read().as_ref().map(|run| run.id);

        let mut removed = 0;
        for entry in self.sorted_entries().into_iter().skip(keep) {
            let id = entry.run.id;
            if Some(id) == current_id {
                continue;
            }
            self.storage.delete_file(&file_name(id))?;
            self.entries.write().remove(&id);
            removed += 1;
            debug!("deleted model {id}");
        }

        if removed > 0 {
            info!("cleanup removed {removed} models, keeping {keep}");
        }
        Ok(removed)
    }

    /// Number of registered runs.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn sorted_entries(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<RegistryEntry> = self.entries.read().values().cloned().collect();
        entries.sort_by(RegistryEntry::newer_first);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TrainingExample;
    use crate::storage::{StorageInput, StorageOutput};
    use crate::trainer::{TrainingConfig, fit};

    fn sample_run(seed: u64) -> TrainingRun {
        let examples = (0..20)
            .map(|i| {
                let x = i as f64 / 20.0;
                TrainingExample::new(i, i, vec![x, 1.0 - x], if x > 0.5 { 1.0 } else { 0.0 })
            })
            .collect();
        let config = TrainingConfig {
            hidden_layers: vec![2],
            epochs: 2,
            min_training_samples: 10,
            seed,
            ..TrainingConfig::default()
        };
        fit(&config, examples).unwrap()
    }

    #[test]
    fn test_empty_registry() {
        let registry = ModelRegistry::in_memory();
        assert!(matches!(
            registry.get_current(),
            Err(PrefnetError::NoModelAvailable)
        ));
        assert!(registry.is_empty());
        assert!(registry.history(None).is_empty());
    }

    #[test]
    fn test_save_and_get() {
        let registry = ModelRegistry::in_memory();
        let run = sample_run(1);
        let expected = run.clone();

        let id = registry.save(run).unwrap();
        assert_eq!(id, expected.id);
        assert_eq!(*registry.get(id).unwrap(), expected);
        assert_eq!(registry.get_current().unwrap().id, id);
        assert!(matches!(
            registry.get(uuid::Uuid::new_v4()),
            Err(PrefnetError::NotFound(_))
        ));
    }

    #[test]
    fn test_latest_save_becomes_current() {
        let registry = ModelRegistry::in_memory();
        let first = registry.save(sample_run(1)).unwrap();
        let second = registry.save(sample_run(2)).unwrap();

        assert_eq!(registry.get_current().unwrap().id, second);
        let history = registry.history(None);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].model_id, second);
        assert_eq!(history[1].model_id, first);
        assert_eq!(registry.history(Some(1)).len(), 1);
    }

    #[test]
    fn test_duplicate_save_rejected() {
        let registry = ModelRegistry::in_memory();
        let run = sample_run(1);
        registry.save(run.clone()).unwrap();
        assert!(registry.save(run).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reopen_restores_runs_and_current() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = ModelRegistry::open(storage.clone()).unwrap();
        let first = sample_run(1);
        let second = sample_run(2);
        let expected = second.clone();
        registry.save(first).unwrap();
        registry.save(second).unwrap();
        drop(registry);

        let reopened = ModelRegistry::open(storage).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(*reopened.get_current().unwrap(), expected);
    }

    #[test]
    fn test_corrupted_file_is_reported() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = ModelRegistry::open(storage.clone()).unwrap();
        let id = registry.save(sample_run(1)).unwrap();

        let name = file_name(id);
        let mut envelope: RunEnvelope =
            serde_json::from_slice(&storage.read_all(&name).unwrap()).unwrap();
        envelope.checksum ^= 1;
        storage.put(&name, &serde_json::to_vec(&envelope).unwrap());

        let err = ModelRegistry::open(storage).unwrap_err();
        assert!(matches!(err, PrefnetError::Storage(_)));
        assert!(err.to_string().contains(&name));
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_open_removes_temp_files() {
        let storage = Arc::new(MemoryStorage::new());
        storage.put("run-x.json_0.tmp", b"partial");
        let registry = ModelRegistry::open(storage.clone()).unwrap();
        assert!(registry.is_empty());
        assert_eq!(storage.file_count(), 0);
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = ModelRegistry::open(storage.clone()).unwrap();
        for seed in 0..4 {
            registry.save(sample_run(seed)).unwrap();
        }
        let current = registry.get_current().unwrap().id;

        assert!(matches!(
            registry.cleanup(0),
            Err(PrefnetError::InvalidConfiguration { .. })
        ));
        assert_eq!(registry.cleanup(2).unwrap(), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(storage.file_count(), 2);
        assert_eq!(registry.get_current().unwrap().id, current);
        assert_eq!(registry.cleanup(2).unwrap(), 0);
    }

    #[derive(Debug)]
    struct ReadOnlyStorage;

    impl Storage for ReadOnlyStorage {
        fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
            Err(StorageError::FileNotFound(name.to_string()).into())
        }
        fn create_output(&self, _name: &str) -> Result<Box<dyn StorageOutput>> {
            Err(StorageError::IoError("read-only".to_string()).into())
        }
        fn delete_file(&self, _name: &str) -> Result<()> {
            Ok(())
        }
        fn list_files(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn rename_file(&self, _old: &str, _new: &str) -> Result<()> {
            Err(StorageError::IoError("read-only".to_string()).into())
        }
        fn create_temp_output(&self, _prefix: &str) -> Result<(String, Box<dyn StorageOutput>)> {
            Err(StorageError::IoError("read-only".to_string()).into())
        }
        fn sync(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_leaves_registry_unchanged() {
        let registry = ModelRegistry::open(Arc::new(ReadOnlyStorage)).unwrap();
        assert!(matches!(
            registry.save(sample_run(1)),
            Err(PrefnetError::Storage(_))
        ));
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get_current(),
            Err(PrefnetError::NoModelAvailable)
        ));
    }
}
