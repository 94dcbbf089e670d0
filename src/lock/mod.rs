//! Entity locks serialising write operations per entity name.
//!
//! The processor takes the lock for a request's entity before a save,
//! upsert or delete runs and holds it until that attempt's context is saved
//! or discarded. Two concurrent upserts of the same entity therefore never
//! both insert the same identity.
//!
//! Locks are only reachable through a [`LockGuard`]; dropping the guard hands
//! the entity back to its manager.

mod in_memory;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub use in_memory::InMemoryLockManager;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// A thread panicked while holding the lock table.
    #[error("lock table poisoned: {0}")]
    Poisoned(String),
    #[error("entity '{0}' was released without being held")]
    NotHeld(String),
}

/// Hands out one writer at a time per entity name.
pub trait LockManager: Send + Sync {
    /// Block until `entity` is free and hold it until the guard drops.
    fn acquire(&self, entity: &str) -> Result<LockGuard, LockError>;

    /// `None` while another writer holds `entity`.
    fn try_acquire(&self, entity: &str) -> Result<Option<LockGuard>, LockError>;

    fn is_held(&self, entity: &str) -> Result<bool, LockError>;
}

/// The side of a lock manager a [`LockGuard`] calls back into.
pub trait LockRelease: Send + Sync {
    fn release(&self, entity: &str) -> Result<(), LockError>;
}

/// Proof that an entity is held. Releases it on drop.
pub struct LockGuard {
    entity: String,
    owner: Arc<dyn LockRelease>,
}

impl LockGuard {
    /// For manager implementations: `owner` must already hold `entity`.
    pub fn new(entity: impl Into<String>, owner: Arc<dyn LockRelease>) -> Self {
        Self {
            entity: entity.into(),
            owner,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("entity", &self.entity).finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = self.owner.release(&self.entity) {
            tracing::warn!(entity = %self.entity, error = %err, "failed to release entity lock");
        }
    }
}
