//! Key/value persistence backing the artifact store.
//!
//! The host storage is modeled as the `KeyValueStore` trait with two
//! implementations:
//! - `FileKvStore`: one JSON file per key, written atomically (unique temp
//!   file then rename). `lock` takes an advisory lock on `<key>.lock` so
//!   writers in different processes serialize their read-modify-write.
//! - `InMemoryKvStore`: in-memory store for testing.

use crate::error::PersistenceError;
use async_trait::async_trait;
use fs2::FileExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Trait for key/value storage backends.
///
/// `set` must replace the stored value in one step: a concurrent `get`
/// sees either the old or the new value, never a mix.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError>;

    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError>;

    /// Exclusive access to `key` until the returned guard drops.
    ///
    /// Backends shared between processes block here until other holders
    /// release the key. The default is a no-op for process-local backends.
    async fn lock(&self, _key: &str) -> Result<KeyLock, PersistenceError> {
        Ok(KeyLock::default())
    }
}

/// Guard returned by `KeyValueStore::lock`. The lock is released on drop.
#[derive(Debug, Default)]
pub struct KeyLock {
    file: Option<File>,
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = file.unlock();
        }
    }
}

/// Atomically write JSON data to a file.
///
/// Serializes `data` to pretty-printed JSON, writes it to a uniquely named temp
/// file in the same directory, then renames onto the target path. Creates
/// parent directories if needed.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically write raw bytes to a file.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Load and deserialize JSON from a file.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    let value =
        serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(value))
}

/// File-backed store: each key lives in `<dir>/<key>.json`.
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the key files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.key_path(key).with_extension("lock")
    }
}

/// Open (creating if needed) and exclusively lock `path`. Blocks.
fn lock_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(file)
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        load_json(&self.key_path(key)).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => PersistenceError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            },
            _ => PersistenceError::Read {
                key: key.to_string(),
                message: e.to_string(),
            },
        })
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
        atomic_write_json(&self.key_path(key), &value).map_err(|e| PersistenceError::Write {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    async fn lock(&self, key: &str) -> Result<KeyLock, PersistenceError> {
        let path = self.lock_path(key);
        let lock_err = |message: String| PersistenceError::Write {
            key: key.to_string(),
            message: format!("lock failed: {message}"),
        };
        let file = tokio::task::spawn_blocking(move || lock_file(&path))
            .await
            .map_err(|e| lock_err(e.to_string()))?
            .map_err(|e| lock_err(e.to_string()))?;
        Ok(KeyLock { file: Some(file) })
    }
}

/// In-memory store for testing.
///
/// Thread-safe via `Mutex<HashMap>`. Writes can be made to fail on demand to
/// exercise the all-or-nothing paths of the artifact store.
pub struct InMemoryKvStore {
    values: Mutex<HashMap<String, Value>>,
    fail_writes: Mutex<bool>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            fail_writes: Mutex::new(false),
        }
    }

    /// Make every subsequent `set` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.lock() {
            *flag = fail;
        }
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        let values = self.values.lock().map_err(|e| PersistenceError::Read {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
        let failing = self.fail_writes.lock().map(|f| *f).unwrap_or(false);
        if failing {
            return Err(PersistenceError::Write {
                key: key.to_string(),
                message: "write rejected".to_string(),
            });
        }
        let mut values = self.values.lock().map_err(|e| PersistenceError::Write {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}
