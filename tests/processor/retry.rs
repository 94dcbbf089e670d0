use std::time::Duration;

use storeflow::{
    ExecutionContext, Operation, Payload, RecordStatus, Request, RequestError, RequestProcessor, UpsertRecord,
    VersionConflictStrategy,
};

use crate::support::stores::{FlakyStore, SpyStore};
use crate::{fetch_all, save};

#[test]
fn invalid_request_performs_no_io() {
    let store = SpyStore::new();
    let processor = RequestProcessor::new(store.clone());

    // Fetch without a predicate.
    let missing_predicate = Request::builder()
        .with_operation(Operation::Fetch)
        .with_entity_name("users")
        .with_retries(5)
        .build_unvalidated();
    let err = processor
        .execute_blocking(ExecutionContext::Background, missing_predicate)
        .unwrap_err();
    assert!(matches!(err, RequestError::Validation(_)));

    let missing_entity = Request::builder()
        .with_operation(Operation::Save)
        .build_unvalidated();
    let err = processor
        .execute(missing_entity)
        .wait()
        .unwrap_err();
    assert!(matches!(err, RequestError::Validation(_)));

    assert_eq!(store.calls(), 0);
}

#[test]
fn store_failing_n_minus_one_times_succeeds_on_attempt_n() {
    crate::support::init_tracing();
    let store = FlakyStore::failing(2);
    let processor = RequestProcessor::new(store.clone());

    let request = save("users", vec![storeflow::Record::new("users").with_field("id", "a")])
        .to_builder()
        .with_retries(3)
        .with_retry_delay(Duration::from_millis(1))
        .build()
        .unwrap();
    let results = processor
        .save(ExecutionContext::Background, request)
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].is_success());
    assert_eq!(store.attempts(), 3);
    assert_eq!(crate::support::all(&store.inner, "users").len(), 1);
}

#[test]
fn retries_exhausted_surface_the_last_error() {
    let store = FlakyStore::failing(10);
    let processor = RequestProcessor::new(store.clone());

    let request = save("users", vec![storeflow::Record::new("users").with_field("id", "a")])
        .to_builder()
        .with_retries(2)
        .build()
        .unwrap();
    let err = processor
        .save(ExecutionContext::Background, request)
        .unwrap_err();

    assert_eq!(err, RequestError::persistence("disk busy (attempt 2)"));
    assert_eq!(store.attempts(), 2);
    assert!(crate::support::all(&store.inner, "users").is_empty());
}

#[test]
fn zero_retries_still_attempts_once() {
    let store = SpyStore::new();
    let processor = RequestProcessor::new(store.clone());
    let request = fetch_all("users").to_builder().with_retries(0).build().unwrap();

    processor
        .fetch(ExecutionContext::Background, request)
        .unwrap();
    assert_eq!(store.calls(), 1);
}

fn mixed_upsert(entity: &str) -> storeflow::RequestBuilder {
    Request::builder()
        .with_operation(Operation::Upsert)
        .with_entity_name(entity)
        .with_strategy(VersionConflictStrategy::Overwrite)
        .add_payload(Payload::versioned(UpsertRecord::new("id", "v").with_field("version", 1)))
        .add_payload(Payload::identifiable(UpsertRecord::new("id", "i").with_field("val", 1)))
}

#[test]
fn mixed_upsert_commits_once() {
    let store = SpyStore::new();
    let processor = RequestProcessor::new(store.clone());

    let results = processor
        .upsert(ExecutionContext::Background, mixed_upsert("users").build().unwrap())
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(store.commits(), 1);
}

#[test]
fn retried_mixed_upsert_inserts_every_item_once() {
    let store = FlakyStore::failing(1);
    let processor = RequestProcessor::new(store.clone());
    let request = mixed_upsert("users")
        .with_retries(2)
        .with_retry_delay(Duration::from_millis(1))
        .build()
        .unwrap();

    let results = processor
        .upsert(ExecutionContext::Background, request)
        .unwrap();

    assert!(results
        .iter()
        .all(|r| r.status() == Some(RecordStatus::Inserted)));
    assert_eq!(store.attempts(), 2);
    assert_eq!(crate::support::all(&store.inner, "users").len(), 2);
}

#[test]
fn mixed_delete_by_data_commits_once() {
    let store = SpyStore::new();
    let processor = RequestProcessor::new(store.clone());
    processor
        .save(
            ExecutionContext::Background,
            save(
                "users",
                vec![
                    storeflow::Record::new("users").with_field("id", "a"),
                    storeflow::Record::new("users").with_field("name", "loose"),
                ],
            ),
        )
        .unwrap();

    let delete = Request::builder()
        .with_operation(Operation::DeleteByData)
        .with_entity_name("users")
        .add_payload(Payload::identifiable(UpsertRecord::new("id", "a")))
        .add_payload(Payload::plain(storeflow::Record::new("users").with_field("name", "loose")))
        .build()
        .unwrap();
    let results = processor
        .delete(ExecutionContext::Background, delete)
        .unwrap();

    assert!(results.iter().all(|r| r.is_success()));
    assert_eq!(store.commits(), 2);
    assert!(crate::support::all(&store.inner, "users").is_empty());
}
