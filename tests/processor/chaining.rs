use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use storeflow::{
    generators, ExecutionContext, InMemoryStore, Output, Payload, Record, RequestError,
    RequestProcessor,
};

use crate::{fetch_all, save};

#[test]
fn failed_previous_step_never_invokes_generator() {
    let processor = RequestProcessor::new(InMemoryStore::new());
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invoked);

    let previous: Result<Vec<Record>, _> = Err(RequestError::persistence("upstream down"));
    let err = processor
        .process_result(
            previous,
            generators::from_fn(move |records: Vec<Record>| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(save("users", records))
            }),
        )
        .wait()
        .unwrap_err();

    assert_eq!(err, RequestError::persistence("upstream down"));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert!(processor.store().is_empty().unwrap());
}

#[test]
fn blocking_chain_skips_generator_too() {
    let processor = RequestProcessor::new(InMemoryStore::new());
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invoked);

    let result = processor.process_result_blocking(
        ExecutionContext::Background,
        Err::<(), _>(RequestError::Network("offline".into())),
        generators::from_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(fetch_all("users"))
        }),
    );

    assert_eq!(result.unwrap_err(), RequestError::Network("offline".into()));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[test]
fn construct_save_then_fetch() {
    let processor = RequestProcessor::new(InMemoryStore::new());

    let constructed: Result<Vec<Payload>, RequestError> = Ok(vec![
        Payload::plain(Record::new("users").with_field("name", "ada")),
        Payload::plain(Record::new("users").with_field("name", "grace")),
    ]);
    let saved = processor.save_to_memory(constructed, "users").wait();
    let results = match &saved {
        Ok(Output::Results(results)) => results.clone(),
        other => panic!("unexpected save outcome: {:?}", other),
    };
    assert_eq!(results.len(), 2);

    let fetched = processor.fetch_all(saved, "users").wait().unwrap();
    assert_eq!(fetched.into_records().len(), 2);
}

#[test]
fn generator_errors_become_the_step_outcome() {
    let processor = RequestProcessor::new(InMemoryStore::new());
    let err = processor
        .process_result(
            Ok(()),
            generators::from_fn(|_| Err(RequestError::validation("nothing to build"))),
        )
        .wait()
        .unwrap_err();
    assert_eq!(err, RequestError::validation("nothing to build"));
}

#[test]
fn constant_generator_ignores_previous_value() {
    let processor = RequestProcessor::new(InMemoryStore::new());
    let output = processor
        .process_result(Ok(42), generators::constant(fetch_all("users")))
        .wait()
        .unwrap();
    assert_eq!(output, Output::Records(vec![]));
}
