use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use super::{LockError, LockGuard, LockManager, LockRelease};

/// Entity names currently held. Every release wakes all waiters, each of
/// which rechecks its own entity.
#[derive(Default)]
struct HeldEntities {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl HeldEntities {
    fn table(&self) -> Result<MutexGuard<'_, HashSet<String>>, LockError> {
        self.held
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))
    }
}

impl LockRelease for HeldEntities {
    fn release(&self, entity: &str) -> Result<(), LockError> {
        if !self.table()?.remove(entity) {
            return Err(LockError::NotHeld(entity.to_string()));
        }
        self.released.notify_all();
        debug!(entity, "entity lock released");
        Ok(())
    }
}

/// Process-local entity locks. Clones share the same table.
#[derive(Clone, Default)]
pub struct InMemoryLockManager {
    entities: Arc<HeldEntities>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [`LockManager::acquire`], giving up with `None` after `timeout`.
    pub fn acquire_timeout(&self, entity: &str, timeout: Duration) -> Result<Option<LockGuard>, LockError> {
        let table = self.entities.table()?;
        let (mut table, waited) = self
            .entities
            .released
            .wait_timeout_while(table, timeout, |held| held.contains(entity))
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        if waited.timed_out() && table.contains(entity) {
            return Ok(None);
        }
        table.insert(entity.to_string());
        Ok(Some(self.guard(entity)))
    }

    /// Names of every entity currently held, sorted.
    pub fn held(&self) -> Result<Vec<String>, LockError> {
        let mut held: Vec<String> = self.entities.table()?.iter().cloned().collect();
        held.sort();
        Ok(held)
    }

    fn guard(&self, entity: &str) -> LockGuard {
        let owner: Arc<dyn LockRelease> = self.entities.clone();
        LockGuard::new(entity, owner)
    }
}

impl LockManager for InMemoryLockManager {
    fn acquire(&self, entity: &str) -> Result<LockGuard, LockError> {
        let table = self.entities.table()?;
        let mut table = self
            .entities
            .released
            .wait_while(table, |held| held.contains(entity))
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        table.insert(entity.to_string());
        Ok(self.guard(entity))
    }

    fn try_acquire(&self, entity: &str) -> Result<Option<LockGuard>, LockError> {
        let mut table = self.entities.table()?;
        if !table.insert(entity.to_string()) {
            return Ok(None);
        }
        Ok(Some(self.guard(entity)))
    }

    fn is_held(&self, entity: &str) -> Result<bool, LockError> {
        Ok(self.entities.table()?.contains(entity))
    }
}
