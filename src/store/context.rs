use std::collections::HashSet;

use tracing::debug;

use super::{ChangeSet, PersistenceStore};
use crate::error::{Outcome, RequestError};
use crate::query::Query;
use crate::record::{Identity, ObjectId, Record};

/// A disposable scratch pad over a store.
///
/// Reads see committed records overlaid with this context's staged changes.
/// Nothing reaches the store until [`Context::save`].
pub struct Context<'a, S: PersistenceStore + ?Sized> {
    store: &'a S,
    changes: ChangeSet,
}

impl<'a, S: PersistenceStore + ?Sized> Context<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            changes: ChangeSet::default(),
        }
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn staged(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn fetch(&self, query: &Query) -> Outcome<Vec<Record>> {
        let unpaged = Query {
            limit: None,
            offset: 0,
            ..query.clone()
        };
        let committed = self.store.fetch(&unpaged)?;
        let merged = self.overlay(committed, |record| query.matches(record));
        Ok(query.apply(merged))
    }

    /// Blocking identity lookup, including records staged in this context.
    pub fn fetch_by_identity(&self, entity: &str, identities: &[Identity]) -> Outcome<Vec<Record>> {
        let committed = self.store.fetch_by_identity(entity, identities)?;
        Ok(self.overlay(committed, |record| {
            record.entity() == entity && identities.iter().any(|id| record.matches_identity(id))
        }))
    }

    /// Stage new records, assigning each an object id.
    pub fn construct(&mut self, records: impl IntoIterator<Item = Record>) -> Outcome<Vec<Record>> {
        let mut constructed = Vec::new();
        for mut record in records {
            record.assign_id(self.store.next_object_id()?);
            self.changes.inserted.push(record.clone());
            constructed.push(record);
        }
        Ok(constructed)
    }

    /// Stage a modified record that was read through this context.
    pub fn update(&mut self, record: Record) -> Outcome<()> {
        let id = require_id(&record, "update")?;
        if let Some(slot) = self.changes.inserted.iter_mut().find(|r| r.id() == Some(id)) {
            *slot = record;
        } else if let Some(slot) = self.changes.updated.iter_mut().find(|r| r.id() == Some(id)) {
            *slot = record;
        } else {
            self.changes.updated.push(record);
        }
        Ok(())
    }

    pub fn delete(&mut self, records: impl IntoIterator<Item = Record>) -> Outcome<()> {
        for record in records {
            let id = require_id(&record, "delete")?;
            let staged_insert = self.changes.inserted.len();
            self.changes.inserted.retain(|r| r.id() != Some(id));
            if self.changes.inserted.len() != staged_insert {
                continue;
            }
            self.changes.updated.retain(|r| r.id() != Some(id));
            if !self.changes.deleted.iter().any(|r| r.id() == Some(id)) {
                self.changes.deleted.push(record);
            }
        }
        Ok(())
    }

    /// Commit staged changes in one call. A context with no changes does nothing.
    pub fn save(&mut self) -> Outcome<()> {
        if !self.has_changes() {
            return Ok(());
        }
        let changes = std::mem::take(&mut self.changes);
        debug!(
            inserted = changes.inserted.len(),
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            "saving context"
        );
        self.store.commit(changes)
    }

    fn overlay<F>(&self, committed: Vec<Record>, include_staged: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        let deleted: HashSet<ObjectId> = self.changes.deleted.iter().filter_map(Record::id).collect();
        let mut merged: Vec<Record> = committed
            .into_iter()
            .filter(|r| r.id().map_or(true, |id| !deleted.contains(&id)))
            .map(|r| {
                self.changes
                    .updated
                    .iter()
                    .find(|u| u.id().is_some() && u.id() == r.id())
                    .cloned()
                    .unwrap_or(r)
            })
            .filter(|r| include_staged(r))
            .collect();
        merged.extend(
            self.changes
                .inserted
                .iter()
                .filter(|r| include_staged(r))
                .cloned(),
        );
        merged
    }
}

fn require_id(record: &Record, action: &str) -> Outcome<ObjectId> {
    record.id().ok_or_else(|| {
        RequestError::persistence(format!(
            "cannot {} {}: record has no object id",
            action,
            record.representation()
        ))
    })
}
