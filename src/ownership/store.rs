//! Device-local key-value storage

use log::warn;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Storage key of the generated device identifier
pub const DEVICE_ID_KEY: &str = "device_id";

/// Storage key of the cached last-saved record
pub const DRAFT_KEY: &str = "draft:last";

/// Storage key of the claim token for a profile
pub fn claim_key(username: &str) -> String {
    format!("claim:{}", username)
}

/// Persistent string map local to one device
///
/// This replaces the ad-hoc browser storage a web client would use: every
/// read and write goes through these operations and nothing else.
pub trait LocalStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write a value only if the key is unset, returning whatever the key
    /// holds afterwards
    ///
    /// The check and the write happen atomically with respect to other
    /// callers sharing this store.
    fn set_if_absent(&self, key: &str, value: &str) -> Result<String>;

    /// Delete a value; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// Delete every value
    fn clear(&self) -> Result<()>;
}

/// Store kept in process memory; forgotten when dropped
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| Error::storage("memory store poisoned"))
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_if_absent(&self, key: &str, value: &str) -> Result<String> {
        Ok(self
            .values()?
            .entry(key.to_string())
            .or_insert_with(|| value.to_string())
            .clone())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.values()?.clear();
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk
///
/// Every write rewrites the whole file through a sibling temporary file
/// and a rename, so a crash leaves either the old or the new map.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open a store at `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(Error::storage(format!("{}: {}", self.path.display(), e))),
        };

        if text.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_str(&text).map_err(|e| {
            warn!("local store {} is malformed: {}", self.path.display(), e);
            Error::storage(format!("{} is malformed: {}", self.path.display(), e))
        })
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| Error::storage(format!("{}: {}", dir.display(), e)))?;
        }

        let tmp = self.path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(values)?;
        fs::write(&tmp, json).map_err(|e| Error::storage(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| Error::storage(format!("{}: {}", self.path.display(), e)))
    }

    /// Load, change and rewrite the map while holding the lock
    ///
    /// The file is only rewritten when `f` reports a change.
    fn update<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut HashMap<String, String>) -> (T, bool),
    {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::storage("file store lock poisoned"))?;
        let mut values = self.load()?;
        let (out, changed) = f(&mut values);
        if changed {
            self.persist(&values)?;
        }
        Ok(out)
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::storage("file store lock poisoned"))?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
            ((), true)
        })
    }

    fn set_if_absent(&self, key: &str, value: &str) -> Result<String> {
        self.update(|values| match values.get(key) {
            Some(existing) => (existing.clone(), false),
            None => {
                values.insert(key.to_string(), value.to_string());
                (value.to_string(), true)
            }
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|values| ((), values.remove(key).is_some()))
    }

    fn clear(&self) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::storage("file store lock poisoned"))?;
        self.persist(&HashMap::new())
    }
}
