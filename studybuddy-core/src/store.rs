//! Artifact store: the newest-first list of saved artifacts, kept on top of
//! a `KeyValueStore` with hash dedup and a capacity bound.
//!
//! The whole sequence lives under one key and is rewritten on every mutation.
//! Mutations are serialized through a single-writer lock, plus the backend's
//! key lock for writers in other processes, so the read-modify-write in
//! `save` can never interleave with another writer.

use crate::error::{PersistenceError, Result};
use crate::persistence::KeyValueStore;
use crate::types::Artifact;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Key holding the artifact sequence.
pub const SAVED_KEY: &str = "sb_saved";
/// Key holding the model readiness flag.
pub const READY_KEY: &str = "sb_ready";
/// Default capacity.
pub const DEFAULT_MAX_ENTRIES: usize = 60;

/// Persistent list of artifacts, newest first.
pub struct ArtifactStore {
    kv: Arc<dyn KeyValueStore>,
    max_entries: usize,
    write_lock: Mutex<()>,
}

impl ArtifactStore {
    /// Create a store over `kv` holding at most `max_entries` artifacts.
    pub fn new(kv: Arc<dyn KeyValueStore>, max_entries: usize) -> Self {
        Self {
            kv,
            max_entries: max_entries.max(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// All saved artifacts, newest first.
    pub async fn list(&self) -> Result<Vec<Artifact>> {
        self.read_all().await
    }

    /// Save `artifact` and return its id.
    ///
    /// The hash is recomputed from the content; an existing entry with the
    /// same hash is replaced, the artifact goes to the front, and the oldest
    /// entries beyond capacity are dropped. Nothing changes if the write fails.
    pub async fn save(&self, mut artifact: Artifact) -> Result<String> {
        let _guard = self.write_lock.lock().await;
        let _key_lock = self.kv.lock(SAVED_KEY).await?;

        artifact.hash = artifact.content_hash();
        let mut items = self.read_all().await?;

        let before = items.len();
        items.retain(|existing| existing.hash != artifact.hash);
        if items.len() != before {
            debug!(hash = %artifact.hash, "Replacing artifact with identical content");
        }

        let id = artifact.id.clone();
        let kind = artifact.kind;
        items.insert(0, artifact);

        if items.len() > self.max_entries {
            let dropped = items.len() - self.max_entries;
            items.truncate(self.max_entries);
            debug!(dropped, "Evicted oldest artifacts beyond capacity");
        }

        self.write_all(&items).await?;
        info!(id = %id, kind = %kind, total = items.len(), "Saved artifact");
        Ok(id)
    }

    /// Artifacts whose id is in `ids`, in store order.
    pub async fn get_many(&self, ids: &HashSet<String>) -> Result<Vec<Artifact>> {
        let items = self.read_all().await?;
        Ok(items.into_iter().filter(|a| ids.contains(&a.id)).collect())
    }

    /// A single artifact by id.
    pub async fn get(&self, id: &str) -> Result<Option<Artifact>> {
        let items = self.read_all().await?;
        Ok(items.into_iter().find(|a| a.id == id))
    }

    /// Remove every artifact.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let _key_lock = self.kv.lock(SAVED_KEY).await?;
        self.write_all(&[]).await?;
        info!("Cleared saved artifacts");
        Ok(())
    }

    /// Persisted model-readiness flag.
    pub async fn is_ready(&self) -> Result<bool> {
        let value = self.kv.get(READY_KEY).await?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    pub async fn set_ready(&self, ready: bool) -> Result<()> {
        self.kv
            .set(READY_KEY, serde_json::Value::Bool(ready))
            .await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<Artifact>> {
        let Some(value) = self.kv.get(SAVED_KEY).await? else {
            return Ok(Vec::new());
        };
        if value.is_null() {
            return Ok(Vec::new());
        }
        let items = serde_json::from_value(value).map_err(|e| PersistenceError::Corrupt {
            key: SAVED_KEY.to_string(),
            message: e.to_string(),
        })?;
        Ok(items)
    }

    async fn write_all(&self, items: &[Artifact]) -> Result<()> {
        let value = serde_json::to_value(items).map_err(|e| PersistenceError::Write {
            key: SAVED_KEY.to_string(),
            message: e.to_string(),
        })?;
        self.kv.set(SAVED_KEY, value).await?;
        Ok(())
    }
}
