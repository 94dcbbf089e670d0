//! Upsert engine - reconciles incoming items with persisted records.
//!
//! One batch runs as follows:
//!
//! 1. Items are stable-sorted by [`Upsertable::compare`]. Items without an
//!    ordering value sort first and ties keep input order.
//! 2. Every persisted record carrying one of the batch's identities is read
//!    into a working set with a single blocking identity fetch.
//! 3. Each item in sorted order looks for its identity in the working set.
//!    A match is resolved through the batch's [`VersionConflictStrategy`];
//!    an overwrite writes the item's update dictionary onto the record field
//!    by field. The match then leaves the working set, so the first item
//!    wins it. Unmatched items join the insert batch.
//! 4. The insert batch is constructed in one pass and the context is saved
//!    once, covering both updates and inserts.
//!
//! Results list the matched items first and the inserted items after them,
//! each group in processing order. An item whose identity repeats within the
//! batch matches at most one persisted record; later duplicates are inserted.
//!
//! Any error (identity fetch, conflict under [`VersionConflictStrategy::Error`],
//! construction or save) aborts the batch before the context is saved, so the
//! store sees none of it.

use std::sync::Arc;

use tracing::debug;

use crate::error::Outcome;
use crate::record::{Identity, Record, Upsertable};
use crate::request::{Resolution, VersionConflictStrategy};
use crate::result::{RecordResult, RecordStatus};
use crate::store::{Context, PersistenceStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertEngine {
    strategy: VersionConflictStrategy,
}

impl UpsertEngine {
    pub fn new(strategy: VersionConflictStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &VersionConflictStrategy {
        &self.strategy
    }

    /// Upsert `items` into `entity` through `context` and save it.
    pub fn upsert<S: PersistenceStore + ?Sized>(
        &self,
        context: &mut Context<'_, S>,
        entity: &str,
        items: &[Arc<dyn Upsertable>],
    ) -> Outcome<Vec<RecordResult>> {
        let results = self.stage(context, entity, items)?;
        context.save()?;
        Ok(results)
    }

    /// Steps 1 to 3 plus construction, leaving the save to the caller so
    /// several batches can share one commit. Reads see what earlier batches
    /// staged on the same context.
    pub fn stage<S: PersistenceStore + ?Sized>(
        &self,
        context: &mut Context<'_, S>,
        entity: &str,
        items: &[Arc<dyn Upsertable>],
    ) -> Outcome<Vec<RecordResult>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut batch: Vec<Arc<dyn Upsertable>> = items.to_vec();
        batch.sort_by(|a, b| a.compare(b.as_ref()));

        let identities: Vec<Identity> = batch.iter().map(|item| item.identity()).collect();
        let mut working_set: Vec<Record> = context.fetch_by_identity(entity, &identities)?;
        debug!(
            entity,
            incoming = batch.len(),
            matched = working_set.len(),
            strategy = %self.strategy,
            "upsert working set fetched"
        );

        let mut results = Vec::with_capacity(batch.len());
        let mut pending: Vec<Arc<dyn Upsertable>> = Vec::new();

        for item in batch {
            let identity = item.identity();
            let position = working_set
                .iter()
                .position(|record| record.matches_identity(&identity));

            let Some(position) = position else {
                pending.push(item);
                continue;
            };

            let mut record = working_set.remove(position);
            match self.strategy.resolve(entity, item.as_ref(), &record)? {
                Resolution::Overwrite => {
                    record.apply(&item.update_dictionary());
                    context.update(record)?;
                    results.push(RecordResult::success(item.representation(), RecordStatus::Updated));
                }
                Resolution::Keep => {
                    results.push(RecordResult::success(item.representation(), RecordStatus::Unchanged));
                }
            }
        }

        let updated = results.len();
        let constructed = context.construct(pending.iter().map(|item| item.to_record(entity)))?;
        results.extend(
            pending
                .iter()
                .zip(&constructed)
                .map(|(item, _)| RecordResult::success(item.representation(), RecordStatus::Inserted)),
        );

        debug!(entity, updated, inserted = constructed.len(), "upsert batch staged");
        Ok(results)
    }
}
