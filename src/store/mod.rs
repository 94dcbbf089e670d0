//! Store - the persistence collaborator and its disposable working contexts.
//!
//! A [`PersistenceStore`] owns committed records. Operations never write to it
//! directly: they open a [`Context`], stage inserts, updates and deletes
//! there, and `save()` hands the whole [`ChangeSet`] to the store in a single
//! `commit`. Dropping a context without saving discards its changes.
//!
//! `persist_to_durable` is a separate step that flushes committed memory to
//! durable storage.

mod context;
mod in_memory;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Outcome, RequestError};
use crate::query::{Predicate, Query};
use crate::record::{Identity, ObjectId, Record};

pub use context::Context;
#[cfg(feature = "emitter")]
pub use in_memory::CHANGE_EVENT;
pub use in_memory::InMemoryStore;

/// Staged changes committed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub inserted: Vec<Record>,
    pub updated: Vec<Record>,
    pub deleted: Vec<Record>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }
}

/// Notification published after a commit touches an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: String,
    pub inserted: Vec<u64>,
    pub updated: Vec<u64>,
    pub deleted: Vec<u64>,
}

/// Backing storage consumed by the request processor.
pub trait PersistenceStore: Send + Sync {
    /// Committed records matching `query`.
    fn fetch(&self, query: &Query) -> Outcome<Vec<Record>>;

    /// Committed records of `entity` carrying any of `identities`. Blocking read.
    fn fetch_by_identity(&self, entity: &str, identities: &[Identity]) -> Outcome<Vec<Record>> {
        self.fetch(&Query::new(entity, Predicate::identities(identities)))
    }

    /// Apply every change or none.
    fn commit(&self, changes: ChangeSet) -> Outcome<()>;

    /// Allocate a handle for a newly constructed record.
    fn next_object_id(&self) -> Outcome<ObjectId>;

    /// Whether `batch_delete` can delete by predicate natively.
    fn supports_batch_delete(&self) -> bool {
        false
    }

    /// Delete every committed record matching `query`, returning them.
    fn batch_delete(&self, _query: &Query) -> Outcome<Vec<Record>> {
        Err(RequestError::persistence("batch delete is not supported by this store"))
    }

    /// Flush committed memory to durable storage.
    fn persist_to_durable(&self) -> Outcome<()>;
}

impl<S: PersistenceStore + ?Sized> PersistenceStore for Arc<S> {
    fn fetch(&self, query: &Query) -> Outcome<Vec<Record>> {
        (**self).fetch(query)
    }

    fn fetch_by_identity(&self, entity: &str, identities: &[Identity]) -> Outcome<Vec<Record>> {
        (**self).fetch_by_identity(entity, identities)
    }

    fn commit(&self, changes: ChangeSet) -> Outcome<()> {
        (**self).commit(changes)
    }

    fn next_object_id(&self) -> Outcome<ObjectId> {
        (**self).next_object_id()
    }

    fn supports_batch_delete(&self) -> bool {
        (**self).supports_batch_delete()
    }

    fn batch_delete(&self, query: &Query) -> Outcome<Vec<Record>> {
        (**self).batch_delete(query)
    }

    fn persist_to_durable(&self) -> Outcome<()> {
        (**self).persist_to_durable()
    }
}
