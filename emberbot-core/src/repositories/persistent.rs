//! Blob-backed trigger repository.
//!
//! The in-memory map is the working copy; a [`ByteStore`] delegate owns the
//! durable bytes (one JSON object keyed by trigger id). Mutations stage a new
//! map, persist it, and only then swap it in, so readers never observe state
//! that failed to reach the store.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use emberbot_common::error::Error;
use emberbot_common::models::{Trigger, SECRET_MASK};
use emberbot_common::traits::ByteStore;

use crate::patterns;
use crate::repositories::{HydratedTrigger, TriggerRepository};

/// Pluggable id source so tests can get predictable ids. Defaults to UUIDv4.
pub type IdGen = Arc<dyn Fn() -> String + Send + Sync>;

struct StoreState {
    loaded: bool,
    entries: HashMap<String, HydratedTrigger>,
}

pub struct PersistentTriggerRepository {
    state: RwLock<StoreState>,
    store: Arc<dyn ByteStore>,
    id_gen: IdGen,
}

impl PersistentTriggerRepository {
    pub fn new(store: Arc<dyn ByteStore>) -> Self {
        Self {
            state: RwLock::new(StoreState {
                loaded: false,
                entries: HashMap::new(),
            }),
            store,
            id_gen: Arc::new(|| Uuid::new_v4().to_string()),
        }
    }

    pub fn with_id_gen(mut self, id_gen: IdGen) -> Self {
        self.id_gen = id_gen;
        self
    }

    /// Lazy load: the blob is not touched until the first access. A missing
    /// blob means "start empty"; an unreadable or unparseable one is fatal
    /// for the call.
    async fn ensure_loaded(&self) -> Result<(), Error> {
        {
            let state = self.state.read().await;
            if state.loaded {
                return Ok(());
            }
        }

        let mut state = self.state.write().await;
        if state.loaded {
            // Another task finished the load while we waited for the lock.
            return Ok(());
        }

        let entries = match self.store.read().await? {
            None => {
                debug!("no trigger blob yet, starting empty");
                HashMap::new()
            }
            Some(bytes) => {
                let raw: HashMap<String, Trigger> = serde_json::from_slice(&bytes)
                    .map_err(|e| Error::Persistence(format!("trigger blob is invalid JSON: {}", e)))?;
                let mut entries = HashMap::with_capacity(raw.len());
                for (id, trigger) in raw {
                    let compiled = patterns::compile(&trigger).map_err(|e| {
                        Error::Persistence(format!("stored trigger {} failed to hydrate: {}", id, e))
                    })?;
                    entries.insert(
                        id,
                        HydratedTrigger {
                            trigger,
                            compiled: Arc::new(compiled),
                        },
                    );
                }
                debug!(count = entries.len(), "loaded triggers from blob");
                entries
            }
        };

        state.entries = entries;
        state.loaded = true;
        Ok(())
    }

    fn serialize(entries: &HashMap<String, HydratedTrigger>) -> Result<Vec<u8>, Error> {
        let raw: HashMap<&String, &Trigger> =
            entries.iter().map(|(id, e)| (id, &e.trigger)).collect();
        Ok(serde_json::to_vec_pretty(&raw)?)
    }
}

#[async_trait]
impl TriggerRepository for PersistentTriggerRepository {
    async fn list(&self) -> Result<Vec<HydratedTrigger>, Error> {
        self.ensure_loaded().await?;
        let state = self.state.read().await;
        let mut triggers: Vec<HydratedTrigger> = state.entries.values().cloned().collect();
        triggers.sort_by(|a, b| a.trigger.trigger_id.cmp(&b.trigger.trigger_id));
        Ok(triggers)
    }

    async fn get(&self, trigger_id: &str) -> Result<Option<HydratedTrigger>, Error> {
        self.ensure_loaded().await?;
        let state = self.state.read().await;
        Ok(state.entries.get(trigger_id).cloned())
    }

    async fn exists(&self, trigger_id: &str) -> Result<bool, Error> {
        self.ensure_loaded().await?;
        let state = self.state.read().await;
        Ok(state.entries.contains_key(trigger_id))
    }

    async fn set(&self, mut trigger: Trigger) -> Result<Trigger, Error> {
        self.ensure_loaded().await?;
        let mut state = self.state.write().await;

        if trigger.trigger_id.is_empty() {
            trigger.trigger_id = (self.id_gen)();
        }
        if trigger.title.is_empty() {
            trigger.title = trigger.trigger_id.clone();
        }

        match state.entries.get(&trigger.trigger_id) {
            Some(previous) => {
                info!(trigger_id = %trigger.trigger_id, "existing trigger, preserving masked secrets");
                trigger.secrets = merge_secrets(trigger.secrets, &previous.trigger.secrets);
            }
            None => {
                info!(trigger_id = %trigger.trigger_id, "new trigger, adopting secrets verbatim");
            }
        }

        let compiled = Arc::new(patterns::compile(&trigger)?);

        // Stage the change, persist the whole set, then commit in memory.
        let mut staged = state.entries.clone();
        staged.insert(
            trigger.trigger_id.clone(),
            HydratedTrigger {
                trigger: trigger.clone(),
                compiled,
            },
        );
        let bytes = Self::serialize(&staged)?;
        self.store.write(&bytes).await?;
        state.entries = staged;

        Ok(trigger)
    }

    async fn delete(&self, trigger_id: &str) -> Result<(), Error> {
        self.ensure_loaded().await?;
        let mut state = self.state.write().await;

        if !state.entries.contains_key(trigger_id) {
            return Err(Error::NotFound(trigger_id.to_string()));
        }

        let mut staged = state.entries.clone();
        staged.remove(trigger_id);
        let bytes = Self::serialize(&staged)?;
        match self.store.write(&bytes).await {
            Ok(()) => {
                state.entries = staged;
                Ok(())
            }
            Err(e) => {
                // The blob state is now unknown; drop the cache and force a
                // reload on the next access instead of guessing.
                warn!(trigger_id, "persist failed during delete, invalidating cache");
                state.loaded = false;
                state.entries.clear();
                Err(e)
            }
        }
    }
}

/// Secret merge for an update of an existing trigger. Admin clients only
/// ever see masked secrets, so an edit that round-trips the masked value
/// must not clobber the real one: a sentinel value for a key that existed
/// before keeps the previous value. Anything else is adopted as sent, and
/// keys missing from the incoming write are dropped.
fn merge_secrets(
    incoming: HashMap<String, String>,
    previous: &HashMap<String, String>,
) -> HashMap<String, String> {
    incoming
        .into_iter()
        .map(|(key, value)| {
            if value == SECRET_MASK {
                if let Some(old) = previous.get(&key) {
                    return (key, old.clone());
                }
            }
            (key, value)
        })
        .collect()
}

/// [`ByteStore`] over a single file on local disk.
pub struct FileByteStore {
    path: PathBuf,
}

impl FileByteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ByteStore for FileByteStore {
    async fn read(&self) -> Result<Option<Vec<u8>>, Error> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Persistence(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::Persistence(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
        }
        tokio::fs::write(&self.path, bytes).await.map_err(|e| {
            Error::Persistence(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}
