//! Ready-made requests and the multi-step flows built from them.
//!
//! ```ignore
//! let saved = processor.save_to_memory(Ok(payload), "users").wait();
//! let persisted = processor.persist_to_durable(saved).wait();
//! ```

use super::RequestProcessor;
use crate::error::Outcome;
use crate::executor::OperationHandle;
use crate::pipeline::generators;
use crate::query::Predicate;
use crate::record::Payload;
use crate::request::{Operation, Request, VersionConflictStrategy};
use crate::result::Output;
use crate::store::PersistenceStore;

impl<S: PersistenceStore + 'static> RequestProcessor<S> {
    /// Fetch every record of `entity`.
    pub fn fetch_all_request(&self, entity: &str) -> Outcome<Request> {
        fetch_all_request(entity)
    }

    pub fn fetch_all<P>(&self, previous: Outcome<P>, entity: &str) -> OperationHandle<Output> {
        let entity = entity.to_string();
        self.process_result(previous, generators::from_fn(move |_| fetch_all_request(&entity)))
    }

    pub fn save_request(&self, entity: &str, payload: Vec<Payload>) -> Outcome<Request> {
        save_request(entity, payload)
    }

    /// Insert the previous step's payload into memory.
    pub fn save_to_memory(&self, previous: Outcome<Vec<Payload>>, entity: &str) -> OperationHandle<Output> {
        let entity = entity.to_string();
        self.process_result(
            previous,
            generators::from_fn(move |payload| save_request(&entity, payload)),
        )
    }

    pub fn upsert_request(
        &self,
        entity: &str,
        payload: Vec<Payload>,
        strategy: VersionConflictStrategy,
    ) -> Outcome<Request> {
        upsert_request(entity, payload, strategy)
    }

    /// Upsert the previous step's payload into memory.
    pub fn upsert_in_memory(
        &self,
        previous: Outcome<Vec<Payload>>,
        entity: &str,
        strategy: VersionConflictStrategy,
    ) -> OperationHandle<Output> {
        let entity = entity.to_string();
        self.process_result(
            previous,
            generators::from_fn(move |payload| upsert_request(&entity, payload, strategy)),
        )
    }

    pub fn persist_request(&self) -> Outcome<Request> {
        persist_request()
    }

    /// Flush memory to durable storage once the previous step has succeeded.
    pub fn persist_to_durable<P>(&self, previous: Outcome<P>) -> OperationHandle<Output> {
        self.process_result(previous, generators::from_fn(|_| persist_request()))
    }
}

fn fetch_all_request(entity: &str) -> Outcome<Request> {
    Request::builder()
        .with_operation(Operation::Fetch)
        .with_entity_name(entity)
        .with_predicate(Predicate::All)
        .with_description(format!("fetch all {}", entity))
        .build()
}

fn save_request(entity: &str, payload: Vec<Payload>) -> Outcome<Request> {
    Request::builder()
        .with_operation(Operation::Save)
        .with_entity_name(entity)
        .with_payload(payload)
        .with_description(format!("save {} to memory", entity))
        .build()
}

fn upsert_request(entity: &str, payload: Vec<Payload>, strategy: VersionConflictStrategy) -> Outcome<Request> {
    Request::builder()
        .with_operation(Operation::Upsert)
        .with_entity_name(entity)
        .with_payload(payload)
        .with_strategy(strategy)
        .with_description(format!("upsert {} in memory", entity))
        .build()
}

fn persist_request() -> Outcome<Request> {
    Request::builder()
        .with_operation(Operation::Persist)
        .with_description("persist to durable storage")
        .build()
}
