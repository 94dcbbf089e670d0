//! RequestProcessor integration tests.

#[path = "../support/mod.rs"]
mod support;

mod chaining;
mod delete;
mod retry;

use storeflow::{Operation, Payload, Predicate, Record, Request};

pub fn fetch_all(entity: &str) -> Request {
    Request::builder()
        .with_operation(Operation::Fetch)
        .with_entity_name(entity)
        .with_predicate(Predicate::All)
        .build()
        .unwrap()
}

pub fn save(entity: &str, records: Vec<Record>) -> Request {
    Request::builder()
        .with_operation(Operation::Save)
        .with_entity_name(entity)
        .with_payload(records.into_iter().map(Payload::plain))
        .build()
        .unwrap()
}
