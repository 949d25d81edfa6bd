//! Session-scoped key/value persistence.
//!
//! Holds the undo/redo stacks, voice assignments and rehearsal preferences
//! of each scene. Everything stored here is a plain JSON snapshot; readers
//! treat missing or unreadable values as "nothing stored".

pub mod settings;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{SceneError, SceneResult};

pub use settings::{ClientSettingsStore, RehearsalSettings, VoiceMap};

/// Key/value backend with session lifetime.
pub trait SessionStorage: Send + Sync {
    /// Reads a raw value.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes a raw value. May fail (quota, I/O).
    fn set(&self, key: &str, value: &str) -> SceneResult<()>;

    /// Removes a value if present.
    fn remove(&self, key: &str);
}

/// Reads and decodes a JSON value, degrading to `None` on absence or corruption.
pub fn load_json<T: DeserializeOwned>(storage: &dyn SessionStorage, key: &str) -> Option<T> {
    let raw = storage.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "discarding unreadable session value");
            None
        }
    }
}

/// Encodes and writes a JSON value. Failures are logged and swallowed:
/// in-memory state stays authoritative for the session.
pub fn store_json<T: Serialize>(storage: &dyn SessionStorage, key: &str, value: &T) -> bool {
    let encoded = match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(key, error = %e, "could not encode session value");
            return false;
        }
    };
    match storage.set(key, &encoded) {
        Ok(()) => true,
        Err(e) => {
            debug!(key, error = %e, "session storage write ignored");
            false
        }
    }
}

// =============================================================================
// IN-MEMORY STORAGE
// =============================================================================

/// Process-local storage, optionally with a byte quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes once keys and values exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> SceneResult<()> {
        let mut entries = self.entries.lock();
        if let Some(quota) = self.quota {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(SceneError::storage(format!(
                    "quota of {} bytes exceeded writing '{}'",
                    quota, key
                )));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

// =============================================================================
// FILE STORAGE
// =============================================================================

/// Directory-backed storage: one file per key.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Uses `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> SceneResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| SceneError::storage(e.to_string()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> SceneResult<()> {
        std::fs::write(self.path_for(key), value).map_err(|e| SceneError::storage(e.to_string()))
    }

    fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.path_for(key));
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_quota() {
        let storage = MemoryStorage::with_quota(16);
        assert!(storage.set("a", "12345").is_ok());
        assert!(storage.set("b", "1234567890123").is_err());
        // Overwriting an existing key only counts the new value.
        assert!(storage.set("a", "123456789").is_ok());
        assert_eq!(storage.get("a").as_deref(), Some("123456789"));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_load_json_degrades_on_corruption() {
        let storage = MemoryStorage::new();
        storage.set("k", "{not json").unwrap();
        assert_eq!(load_json::<Vec<i64>>(&storage, "k"), None);
        assert_eq!(load_json::<Vec<i64>>(&storage, "missing"), None);

        assert!(store_json(&storage, "k", &vec![1, 2, 3]));
        assert_eq!(load_json::<Vec<i64>>(&storage, "k"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_store_json_swallows_quota_errors() {
        let storage = MemoryStorage::with_quota(4);
        assert!(!store_json(&storage, "history", &vec!["far too long"]));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session")).unwrap();

        assert_eq!(storage.get("scene-history:4"), None);
        storage.set("scene-history:4", "[]").unwrap();
        assert_eq!(storage.get("scene-history:4").as_deref(), Some("[]"));
        assert!(storage.dir().join("scene-history_4.json").exists());

        storage.remove("scene-history:4");
        assert_eq!(storage.get("scene-history:4"), None);
    }
}
