//! One execution path per operation. Each call is one attempt; retrying is
//! the caller's concern.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Outcome, RequestError};
use crate::query::Query;
use crate::record::{Identity, Payload, Record, Upsertable};
use crate::request::{Operation, Request, VersionConflictStrategy};
use crate::result::{Output, RecordResult, RecordStatus};
use crate::store::{Context, PersistenceStore};
use crate::upsert::UpsertEngine;

pub(crate) fn dispatch<S: PersistenceStore + ?Sized>(store: &S, request: &Request) -> Outcome<Output> {
    match request.operation()? {
        Operation::Fetch => fetch(store, request),
        Operation::Save => save(store, request),
        Operation::Upsert => upsert(store, request),
        Operation::DeleteByData => delete_by_data(store, request),
        Operation::DeleteByQuery => delete_by_query(store, request),
        Operation::Persist => {
            store.persist_to_durable()?;
            Ok(Output::Persisted)
        }
    }
}

fn fetch<S: PersistenceStore + ?Sized>(store: &S, request: &Request) -> Outcome<Output> {
    Ok(Output::Records(store.fetch(&request.query()?)?))
}

/// Insert every payload item as a new record. Plain records that already
/// carry an object id are reported as failures and skipped.
fn save<S: PersistenceStore + ?Sized>(store: &S, request: &Request) -> Outcome<Output> {
    let entity = request.entity_name()?;
    let mut context = Context::new(store);
    let mut results = Vec::with_capacity(request.payload().len());

    for item in request.payload() {
        if let Payload::Plain(record) = item {
            if let Some(id) = record.id() {
                results.push(RecordResult::failure(
                    item.representation(),
                    RequestError::persistence(format!("{} is already persisted as {}", entity, id)),
                ));
                continue;
            }
        }
        let constructed = context.construct(std::iter::once(item.to_record(entity)))?;
        let representation = match item {
            Payload::Plain(_) => constructed
                .first()
                .map(Record::representation)
                .unwrap_or_else(|| item.representation()),
            _ => item.representation(),
        };
        results.push(RecordResult::success(representation, RecordStatus::Inserted));
    }

    context.save()?;
    Ok(Output::Results(results))
}

/// Versioned items go through the request's strategy, then identifiable
/// items are upserted with overwrite. Both subsets stage into one context
/// that is saved once, so a failed attempt commits neither.
fn upsert<S: PersistenceStore + ?Sized>(store: &S, request: &Request) -> Outcome<Output> {
    let entity = request.entity_name()?;
    let strategy = request.version_conflict_strategy()?;

    let mut versioned: Vec<Arc<dyn Upsertable>> = Vec::new();
    let mut identifiable: Vec<Arc<dyn Upsertable>> = Vec::new();
    for item in request.payload() {
        match item {
            Payload::Versioned(item) => versioned.push(Arc::clone(item)),
            Payload::Identifiable(item) => identifiable.push(Arc::clone(item)),
            Payload::Plain(record) => {
                return Err(RequestError::validation(format!(
                    "upsert payload must be identifiable, got plain record {}",
                    record.representation()
                )))
            }
        }
    }
    debug!(entity, versioned = versioned.len(), identifiable = identifiable.len(), "upsert partitioned");

    let mut context = Context::new(store);
    let mut results = UpsertEngine::new(strategy.clone()).stage(&mut context, entity, &versioned)?;
    results.extend(UpsertEngine::new(VersionConflictStrategy::Overwrite).stage(&mut context, entity, &identifiable)?);
    context.save()?;
    Ok(Output::Results(results))
}

/// Identifiable items are fetched by identity and deleted first, then plain
/// records are deleted by object id or exact field match. Results follow the
/// same order. Items that match nothing are reported as failures. All
/// deletions are committed together.
fn delete_by_data<S: PersistenceStore + ?Sized>(store: &S, request: &Request) -> Outcome<Output> {
    let entity = request.entity_name()?;

    let mut identifiable = Vec::new();
    let mut plain = Vec::new();
    for item in request.payload() {
        match item {
            Payload::Plain(record) => plain.push(record),
            Payload::Identifiable(item) | Payload::Versioned(item) => identifiable.push(item),
        }
    }

    let mut results = Vec::with_capacity(request.payload().len());
    let mut context = Context::new(store);

    if !identifiable.is_empty() {
        let identities: Vec<Identity> = identifiable.iter().map(|item| item.identity()).collect();
        let mut found = context.fetch_by_identity(entity, &identities)?;

        for (item, identity) in identifiable.iter().zip(&identities) {
            let (matched, rest): (Vec<Record>, Vec<Record>) =
                found.into_iter().partition(|record| record.matches_identity(identity));
            found = rest;
            results.push(deleted_or_missing(entity, item.representation(), matched.is_empty()));
            context.delete(matched)?;
        }
    }

    if !plain.is_empty() {
        let mut candidates = context.fetch(&Query::all(entity))?;

        for record in plain {
            let position = candidates.iter().position(|candidate| match record.id() {
                Some(id) => candidate.id() == Some(id),
                None => candidate.fields() == record.fields(),
            });
            results.push(deleted_or_missing(entity, record.representation(), position.is_none()));
            if let Some(position) = position {
                context.delete(std::iter::once(candidates.remove(position)))?;
            }
        }
    }

    context.save()?;
    Ok(Output::Results(results))
}

fn deleted_or_missing(entity: &str, representation: String, missing: bool) -> RecordResult {
    if missing {
        let error = RequestError::persistence(format!("no {} record matches {}", entity, representation));
        RecordResult::failure(representation, error)
    } else {
        RecordResult::success(representation, RecordStatus::Deleted)
    }
}

/// Native batch delete when the store offers it, otherwise fetch then delete.
fn delete_by_query<S: PersistenceStore + ?Sized>(store: &S, request: &Request) -> Outcome<Output> {
    let query = request.query()?;

    let removed = if store.supports_batch_delete() {
        debug!(entity = %query.entity, "native batch delete");
        store.batch_delete(&query)?
    } else {
        debug!(entity = %query.entity, "fetch-then-delete fallback");
        let mut context = Context::new(store);
        let matched = context.fetch(&query)?;
        context.delete(matched.clone())?;
        context.save()?;
        matched
    };

    Ok(Output::Results(
        removed
            .iter()
            .map(|record| RecordResult::success(record.representation(), RecordStatus::Deleted))
            .collect(),
    ))
}
