//! Upsert scenarios through the request processor.

#[path = "../support/mod.rs"]
mod support;

use serde::Serialize;
use serde_json::json;
use storeflow::{
    ExecutionContext, InMemoryStore, Operation, Payload, RecordStatus, Request, RequestError,
    RequestProcessor, Upsertable, VersionConflictStrategy,
};
use support::all;

#[derive(Debug, Clone, Serialize, Upsertable)]
struct Dummy {
    id: String,
    val: i64,
}

fn dummy(id: &str, val: i64) -> Payload {
    Payload::identifiable(Dummy { id: id.into(), val })
}

/// Versioned items go through the request's strategy instead of overwrite.
fn versioned(id: &str, val: i64) -> Payload {
    Payload::versioned(Dummy { id: id.into(), val })
}

fn upsert(payload: Vec<Payload>, strategy: VersionConflictStrategy) -> Request {
    Request::builder()
        .with_operation(Operation::Upsert)
        .with_entity_name("dummies")
        .with_payload(payload)
        .with_strategy(strategy)
        .build()
        .unwrap()
}

fn values(store: &InMemoryStore) -> Vec<(String, i64)> {
    let mut values: Vec<(String, i64)> = all(store, "dummies")
        .iter()
        .map(|record| {
            (
                record.get("id").and_then(|v| v.as_str()).unwrap().to_string(),
                record.get("val").and_then(|v| v.as_i64()).unwrap(),
            )
        })
        .collect();
    values.sort();
    values
}

#[test]
fn upsert_into_empty_store_inserts_every_item() {
    support::init_tracing();
    let processor = RequestProcessor::new(InMemoryStore::new());

    let results = processor
        .upsert(
            ExecutionContext::Background,
            upsert(vec![dummy("a", 1), dummy("b", 2)], VersionConflictStrategy::Overwrite),
        )
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status() == Some(RecordStatus::Inserted)));
    assert_eq!(values(processor.store()), vec![("a".into(), 1), ("b".into(), 2)]);
}

#[test]
fn upsert_overwrites_existing_without_duplicating() {
    let processor = RequestProcessor::new(InMemoryStore::new());
    processor
        .upsert(
            ExecutionContext::Background,
            upsert(vec![dummy("a", 1)], VersionConflictStrategy::Overwrite),
        )
        .unwrap();

    let results = processor
        .upsert(
            ExecutionContext::Background,
            upsert(vec![dummy("a", 9)], VersionConflictStrategy::Overwrite),
        )
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status(), Some(RecordStatus::Updated));
    assert_eq!(values(processor.store()), vec![("a".into(), 9)]);
}

#[test]
fn fields_missing_from_update_survive() {
    let processor = RequestProcessor::new(InMemoryStore::new());
    let seed = Request::builder()
        .with_operation(Operation::Save)
        .with_entity_name("dummies")
        .add_payload(Payload::plain(
            storeflow::Record::new("dummies")
                .with_field("id", "a")
                .with_field("val", 1)
                .with_field("note", "keep me"),
        ))
        .build()
        .unwrap();
    processor.save(ExecutionContext::Background, seed).unwrap();

    processor
        .upsert(
            ExecutionContext::Background,
            upsert(vec![dummy("a", 2)], VersionConflictStrategy::Overwrite),
        )
        .unwrap();

    let records = all(processor.store(), "dummies");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("val"), Some(&json!(2)));
    assert_eq!(records[0].get("note"), Some(&json!("keep me")));
}

#[test]
fn repeating_a_batch_is_idempotent() {
    let processor = RequestProcessor::new(InMemoryStore::new());
    let batch = || upsert(vec![dummy("a", 1), dummy("b", 2)], VersionConflictStrategy::Overwrite);

    processor.upsert(ExecutionContext::Background, batch()).unwrap();
    let first = values(processor.store());
    let second_run = processor.upsert(ExecutionContext::Background, batch()).unwrap();

    assert_eq!(values(processor.store()), first);
    assert!(second_run.iter().all(|r| r.status() == Some(RecordStatus::Updated)));
}

#[test]
fn error_strategy_fails_and_leaves_store_untouched() {
    let processor = RequestProcessor::new(InMemoryStore::new());
    processor
        .upsert(
            ExecutionContext::Background,
            upsert(vec![dummy("a", 1)], VersionConflictStrategy::Overwrite),
        )
        .unwrap();

    let err = processor
        .upsert(
            ExecutionContext::Background,
            upsert(vec![versioned("b", 5), versioned("a", 2)], VersionConflictStrategy::Error),
        )
        .unwrap_err();

    assert_eq!(
        err,
        RequestError::Conflict {
            entity: "dummies".into(),
            identity: "id=a".into()
        }
    );
    assert_eq!(values(processor.store()), vec![("a".into(), 1)]);
}

#[test]
fn identifiable_items_always_overwrite() {
    let processor = RequestProcessor::new(InMemoryStore::new());
    processor
        .upsert(
            ExecutionContext::Background,
            upsert(vec![dummy("a", 1)], VersionConflictStrategy::Overwrite),
        )
        .unwrap();

    let results = processor
        .upsert(
            ExecutionContext::Background,
            upsert(vec![dummy("a", 2)], VersionConflictStrategy::Error),
        )
        .unwrap();

    assert_eq!(results[0].status(), Some(RecordStatus::Updated));
    assert_eq!(values(processor.store()), vec![("a".into(), 2)]);
}

#[derive(Debug, Clone, Serialize, Upsertable)]
struct Versioned {
    #[upsertable(key)]
    sku: String,
    version: u32,
    price: u32,
}

#[test]
fn preserve_if_newer_keeps_fresher_records() {
    let processor = RequestProcessor::new(InMemoryStore::new());
    let strategy = VersionConflictStrategy::preserve_if_newer("version");
    let item = |version, price| {
        Payload::versioned(Versioned {
            sku: "x-1".into(),
            version,
            price,
        })
    };

    let request = |payload| {
        Request::builder()
            .with_operation(Operation::Upsert)
            .with_entity_name("products")
            .with_payload(payload)
            .with_strategy(strategy.clone())
            .build()
            .unwrap()
    };

    processor
        .upsert(ExecutionContext::Background, request(vec![item(3, 100)]))
        .unwrap();
    let stale = processor
        .upsert(ExecutionContext::Background, request(vec![item(2, 50)]))
        .unwrap();
    assert_eq!(stale[0].status(), Some(RecordStatus::Unchanged));

    let fresh = processor
        .upsert(ExecutionContext::Background, request(vec![item(4, 120)]))
        .unwrap();
    assert_eq!(fresh[0].status(), Some(RecordStatus::Updated));

    let products = all(processor.store(), "products");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].get("price"), Some(&json!(120)));
    assert_eq!(products[0].get("version"), Some(&json!(4)));
}

#[test]
fn plain_payload_is_rejected_for_upsert() {
    let err = Request::builder()
        .with_operation(Operation::Upsert)
        .with_entity_name("dummies")
        .with_strategy(VersionConflictStrategy::Overwrite)
        .add_payload(Payload::plain(storeflow::Record::new("dummies").with_field("id", "a")))
        .build()
        .unwrap_err();
    assert!(matches!(err, RequestError::Validation(_)));
}
