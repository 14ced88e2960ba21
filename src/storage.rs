use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Settings, Task};

pub const TASKS_KEY: &str = "tasks";
pub const SETTINGS_KEY: &str = "settings";
pub const UNREADABLE_TASKS_PREFIX: &str = "tasks-unreadable-";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Byte values stored under string keys.
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        (**self).write(key, value)
    }
}

/// Load/save of the whole task collection.
pub trait TaskPersistence: Send + Sync {
    fn load_tasks(&self) -> Result<Vec<Task>, StorageError>;
    fn save_tasks(&self, tasks: &[Task]) -> Result<(), StorageError>;

    /// Copies the stored collection to a side key so a later save cannot destroy it.
    /// Returns the key it was copied to, or `None` when nothing was stored.
    fn preserve_unreadable(&self) -> Result<Option<String>, StorageError>;
}

impl<S: KeyValueStore> TaskPersistence for S {
    fn load_tasks(&self) -> Result<Vec<Task>, StorageError> {
        Ok(read_json(self, TASKS_KEY)?.unwrap_or_default())
    }

    fn save_tasks(&self, tasks: &[Task]) -> Result<(), StorageError> {
        write_json(self, TASKS_KEY, &tasks)
    }

    fn preserve_unreadable(&self) -> Result<Option<String>, StorageError> {
        let bytes = match self.read(TASKS_KEY)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let key = format!("{UNREADABLE_TASKS_PREFIX}{timestamp}");
        self.write(&key, &bytes)?;
        Ok(Some(key))
    }
}

pub fn load_settings(store: &impl KeyValueStore) -> Result<Settings, StorageError> {
    Ok(read_json(store, SETTINGS_KEY)?.unwrap_or_default())
}

pub fn save_settings(store: &impl KeyValueStore, settings: &Settings) -> Result<(), StorageError> {
    write_json(store, SETTINGS_KEY, settings)
}

fn read_json<T: DeserializeOwned>(
    store: &impl KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.read(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn write_json<T: Serialize + ?Sized>(
    store: &impl KeyValueStore,
    key: &str,
    data: &T,
) -> Result<(), StorageError> {
    let json = serde_json::to_vec_pretty(data)?;
    store.write(key, &json)
}

/// One `<key>.json` file per key below `root`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn write_atomic(&self, path: PathBuf, bytes: &[u8]) -> Result<(), StorageError> {
        let temp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(temp_path, path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut file = match File::open(self.path_for(key)) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(Some(buf))
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.ensure_dirs()?;
        self.write_atomic(self.path_for(key), value)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(key).cloned())
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
