//! InMemoryStore - map-backed store with a memory layer and a durable snapshot.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ChangeEvent, ChangeSet, PersistenceStore};
use crate::config::StoreConfig;
use crate::error::{Outcome, RequestError};
use crate::query::Query;
use crate::record::{ObjectId, Record};

#[cfg(feature = "emitter")]
use event_emitter_rs::EventEmitter;
#[cfg(feature = "emitter")]
use std::sync::Mutex;

/// Event name change notifications are published under.
#[cfg(feature = "emitter")]
pub const CHANGE_EVENT: &str = "change";

type Table = BTreeMap<ObjectId, Record>;

/// On-disk shape of the durable layer.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    records: Vec<Record>,
}

/// In-memory store. Commits land in memory; `persist_to_durable` copies
/// memory into the durable layer and, when configured, a JSON snapshot file.
///
/// Clone-friendly via Arc.
#[derive(Clone)]
pub struct InMemoryStore {
    memory: Arc<RwLock<Table>>,
    durable: Arc<RwLock<Table>>,
    next_id: Arc<AtomicU64>,
    config: StoreConfig,
    #[cfg(feature = "emitter")]
    emitter: Arc<Mutex<EventEmitter>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// An empty store. Use [`InMemoryStore::open`] to reload a snapshot.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            memory: Arc::new(RwLock::new(Table::new())),
            durable: Arc::new(RwLock::new(Table::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            config,
            #[cfg(feature = "emitter")]
            emitter: Arc::new(Mutex::new(EventEmitter::new())),
        }
    }

    /// Create a store, loading the snapshot at `durable_path` if the file exists.
    pub fn open(config: StoreConfig) -> Outcome<Self> {
        let store = Self::with_config(config);
        let Some(path) = store.config.durable_path.clone() else {
            return Ok(store);
        };
        if !path.exists() {
            return Ok(store);
        }

        let bytes = fs::read(&path).map_err(|e| {
            RequestError::persistence(format!("failed to read {}: {}", path.display(), e))
        })?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        let table: Table = snapshot
            .records
            .into_iter()
            .filter_map(|record| record.id().map(|id| (id, record)))
            .collect();

        info!(path = %path.display(), records = table.len(), "loaded durable snapshot");
        store.next_id.store(snapshot.next_id.max(1), Ordering::SeqCst);
        *write(&store.durable)? = table.clone();
        *write(&store.memory)? = table;
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Committed records of `entity` in object id order.
    pub fn records(&self, entity: &str) -> Outcome<Vec<Record>> {
        let memory = read(&self.memory)?;
        Ok(memory
            .values()
            .filter(|r| r.entity() == entity)
            .cloned()
            .collect())
    }

    /// Records of `entity` as of the last durable flush.
    pub fn durable_records(&self, entity: &str) -> Outcome<Vec<Record>> {
        let durable = read(&self.durable)?;
        Ok(durable
            .values()
            .filter(|r| r.entity() == entity)
            .cloned()
            .collect())
    }

    pub fn len(&self) -> Outcome<usize> {
        Ok(read(&self.memory)?.len())
    }

    pub fn is_empty(&self) -> Outcome<bool> {
        Ok(self.len()? == 0)
    }

    /// Register a listener for commits. Returns an id for [`InMemoryStore::unsubscribe`].
    #[cfg(feature = "emitter")]
    pub fn subscribe<F>(&self, listener: F) -> Outcome<String>
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| RequestError::persistence("emitter lock poisoned"))?;
        Ok(emitter.on(CHANGE_EVENT, listener))
    }

    #[cfg(feature = "emitter")]
    pub fn unsubscribe(&self, id: &str) -> Outcome<bool> {
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| RequestError::persistence("emitter lock poisoned"))?;
        Ok(emitter.remove_listener(id).is_some())
    }

    // Listeners run on emitter threads; joining keeps notification ordered
    // before the committing call returns.
    #[cfg(feature = "emitter")]
    fn publish(&self, events: Vec<ChangeEvent>) {
        let handles = match self.emitter.lock() {
            Ok(mut emitter) => events
                .into_iter()
                .flat_map(|event| emitter.emit(CHANGE_EVENT, event))
                .collect::<Vec<_>>(),
            Err(_) => {
                tracing::warn!("emitter lock poisoned, change events dropped");
                return;
            }
        };
        for handle in handles {
            if handle.join().is_err() {
                tracing::warn!("change listener panicked");
            }
        }
    }

    #[cfg(not(feature = "emitter"))]
    fn publish(&self, _events: Vec<ChangeEvent>) {}
}

fn read(table: &RwLock<Table>) -> Outcome<std::sync::RwLockReadGuard<'_, Table>> {
    table
        .read()
        .map_err(|_| RequestError::persistence("lock poisoned"))
}

fn write(table: &RwLock<Table>) -> Outcome<std::sync::RwLockWriteGuard<'_, Table>> {
    table
        .write()
        .map_err(|_| RequestError::persistence("lock poisoned"))
}

/// Group a change set into one event per touched entity, in first-seen order.
fn change_events(changes: &ChangeSet) -> Vec<ChangeEvent> {
    let mut events: Vec<ChangeEvent> = Vec::new();
    let mut slot = |entity: &str| -> usize {
        match events.iter().position(|e| e.entity == entity) {
            Some(index) => index,
            None => {
                events.push(ChangeEvent {
                    entity: entity.to_string(),
                    ..ChangeEvent::default()
                });
                events.len() - 1
            }
        }
    };

    let mut touched = Vec::new();
    for record in &changes.inserted {
        touched.push((slot(record.entity()), 0, record.id()));
    }
    for record in &changes.updated {
        touched.push((slot(record.entity()), 1, record.id()));
    }
    for record in &changes.deleted {
        touched.push((slot(record.entity()), 2, record.id()));
    }
    for (index, kind, id) in touched {
        let Some(ObjectId(id)) = id else { continue };
        let event = &mut events[index];
        match kind {
            0 => event.inserted.push(id),
            1 => event.updated.push(id),
            _ => event.deleted.push(id),
        }
    }
    events
}

impl PersistenceStore for InMemoryStore {
    fn fetch(&self, query: &Query) -> Outcome<Vec<Record>> {
        let memory = read(&self.memory)?;
        Ok(query.apply(memory.values().cloned()))
    }

    fn commit(&self, changes: ChangeSet) -> Outcome<()> {
        if changes.is_empty() {
            return Ok(());
        }

        {
            let mut memory = write(&self.memory)?;

            // Validate everything before touching the table.
            let mut inserted = HashSet::new();
            for record in &changes.inserted {
                let id = record.id().ok_or_else(|| {
                    RequestError::persistence(format!(
                        "cannot insert {}: record was not constructed in a context",
                        record.representation()
                    ))
                })?;
                if memory.contains_key(&id) || !inserted.insert(id) {
                    return Err(RequestError::persistence(format!(
                        "object id {} is already taken",
                        id
                    )));
                }
            }
            for record in changes.updated.iter().chain(&changes.deleted) {
                match record.id() {
                    Some(id) if memory.contains_key(&id) => {}
                    _ => {
                        return Err(RequestError::persistence(format!(
                            "record {} no longer exists",
                            record.representation()
                        )))
                    }
                }
            }

            for record in changes.inserted.iter().chain(&changes.updated) {
                if let Some(id) = record.id() {
                    memory.insert(id, record.clone());
                }
            }
            for record in &changes.deleted {
                if let Some(id) = record.id() {
                    memory.remove(&id);
                }
            }
        }

        debug!(
            inserted = changes.inserted.len(),
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            "committed changes"
        );
        self.publish(change_events(&changes));
        Ok(())
    }

    fn next_object_id(&self) -> Outcome<ObjectId> {
        Ok(ObjectId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn supports_batch_delete(&self) -> bool {
        self.config.native_batch_delete
    }

    fn batch_delete(&self, query: &Query) -> Outcome<Vec<Record>> {
        let removed = {
            let mut memory = write(&self.memory)?;
            let matched = query.apply(memory.values().cloned());
            for record in &matched {
                if let Some(id) = record.id() {
                    memory.remove(&id);
                }
            }
            matched
        };

        debug!(entity = %query.entity, deleted = removed.len(), "batch delete");
        if !removed.is_empty() {
            self.publish(change_events(&ChangeSet {
                deleted: removed.clone(),
                ..ChangeSet::default()
            }));
        }
        Ok(removed)
    }

    fn persist_to_durable(&self) -> Outcome<()> {
        let snapshot = read(&self.memory)?.clone();

        if let Some(path) = &self.config.durable_path {
            let document = Snapshot {
                next_id: self.next_id.load(Ordering::SeqCst),
                records: snapshot.values().cloned().collect(),
            };
            let bytes = serde_json::to_vec_pretty(&document)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    RequestError::persistence(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
            fs::write(path, bytes).map_err(|e| {
                RequestError::persistence(format!("failed to write {}: {}", path.display(), e))
            })?;
            info!(path = %path.display(), records = snapshot.len(), "persisted durable snapshot");
        }

        *write(&self.durable)? = snapshot;
        Ok(())
    }
}
