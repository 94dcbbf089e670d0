use serde::Serialize;
use storeflow::{
    ExecutionContext, InMemoryStore, Operation, Payload, Predicate, Record, RecordStatus, Request,
    RequestProcessor, StoreConfig, Upsertable,
};

use crate::save;
use crate::support::all;

#[derive(Debug, Serialize, Upsertable)]
struct Dummy {
    id: String,
}

#[test]
fn mixed_batch_deletes_identifiable_items_first() {
    let processor = RequestProcessor::new(InMemoryStore::new());
    processor
        .save(
            ExecutionContext::Background,
            save(
                "dummies",
                vec![
                    Record::new("dummies").with_field("id", "a").with_field("val", 1),
                    Record::new("dummies").with_field("label", "loose"),
                ],
            ),
        )
        .unwrap();

    // Plain record first in the payload, identifiable second.
    let delete = Request::builder()
        .with_operation(Operation::DeleteByData)
        .with_entity_name("dummies")
        .add_payload(Payload::plain(Record::new("dummies").with_field("label", "loose")))
        .add_payload(Payload::identifiable(Dummy { id: "a".into() }))
        .build()
        .unwrap();
    let results = processor
        .delete(ExecutionContext::Background, delete)
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].representation(), "id=a");
    assert!(results[1].representation().contains("loose"));
    assert!(results
        .iter()
        .all(|r| r.status() == Some(RecordStatus::Deleted)));
    assert!(all(processor.store(), "dummies").is_empty());
}

#[test]
fn delete_by_query_uses_fallback_when_native_is_off() {
    for native in [true, false] {
        let store = InMemoryStore::with_config(StoreConfig {
            native_batch_delete: native,
            ..StoreConfig::default()
        });
        let processor = RequestProcessor::new(store);
        processor
            .save(
                ExecutionContext::Background,
                save(
                    "events",
                    (1..=5)
                        .map(|day| Record::new("events").with_field("day", day))
                        .collect(),
                ),
            )
            .unwrap();

        let delete = Request::builder()
            .with_operation(Operation::DeleteByQuery)
            .with_entity_name("events")
            .with_predicate(Predicate::lt("day", 3))
            .build()
            .unwrap();
        let results = processor
            .delete(ExecutionContext::Background, delete)
            .unwrap();

        assert_eq!(results.len(), 2, "native batch delete = {}", native);
        assert_eq!(all(processor.store(), "events").len(), 3);
    }
}

#[test]
fn unmatched_items_are_reported_not_raised() {
    let processor = RequestProcessor::new(InMemoryStore::new());
    let delete = Request::builder()
        .with_operation(Operation::DeleteByData)
        .with_entity_name("dummies")
        .add_payload(Payload::identifiable(Dummy { id: "ghost".into() }))
        .build()
        .unwrap();

    let results = processor
        .delete(ExecutionContext::Background, delete)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(!results[0].is_success());
}
