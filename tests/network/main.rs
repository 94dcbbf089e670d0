//! Network processor integration tests over a scripted transport.

#[path = "../support/mod.rs"]
mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use storeflow::{
    generators, ExecutionContext, InMemoryStore, Method, NetworkProcessor, NetworkRequest,
    NetworkTransport, Outcome, Payload, RecordStatus, RequestError, RequestProcessor, Upsertable,
    VersionConflictStrategy,
};

/// Fails the first `failures` calls, then answers with `body`.
struct Scripted {
    failures: usize,
    body: Vec<u8>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, Option<String>)>>,
}

impl Scripted {
    fn new(failures: usize, body: &str) -> Arc<Self> {
        Arc::new(Self {
            failures,
            body: body.as_bytes().to_vec(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NetworkTransport for Scripted {
    fn execute(&self, request: &NetworkRequest) -> Outcome<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen.lock().unwrap().push((
            request.url()?.to_string(),
            request.headers().get("authorization").cloned(),
        ));
        if call <= self.failures {
            return Err(RequestError::Network(format!("connection reset ({})", call)));
        }
        Ok(self.body.clone())
    }
}

fn users_request(retries: usize) -> NetworkRequest {
    NetworkRequest::builder()
        .with_method(Method::Get)
        .with_base_url("https://api.example.com/v1")
        .with_path("users")
        .add_param("active", "true")
        .with_retries(retries)
        .with_retry_delay(Duration::from_millis(1))
        .build()
        .unwrap()
}

#[test]
fn transport_failing_n_minus_one_times_succeeds_on_attempt_n() {
    support::init_tracing();
    let transport = Scripted::new(2, "[]");
    let processor = NetworkProcessor::new(Arc::clone(&transport));

    let body = processor.execute(users_request(3)).wait().unwrap();

    assert_eq!(body, b"[]".to_vec());
    assert_eq!(transport.calls(), 3);
}

#[test]
fn exhausted_retries_return_the_network_error() {
    let transport = Scripted::new(5, "[]");
    let processor = NetworkProcessor::new(Arc::clone(&transport));

    let err = processor
        .execute_blocking(ExecutionContext::Background, users_request(2))
        .unwrap_err();

    assert_eq!(err, RequestError::Network("connection reset (2)".into()));
    assert_eq!(transport.calls(), 2);
}

#[test]
fn request_middleware_applies_to_every_attempt() {
    let transport = Scripted::new(1, "[]");
    let processor = NetworkProcessor::builder()
        .transport(Arc::clone(&transport))
        .request_middleware("auth", |request: NetworkRequest| {
            Ok(request
                .to_builder()
                .add_header("authorization", "Bearer t0k3n")
                .build_unvalidated())
        })
        .build()
        .unwrap();

    processor.execute(users_request(2)).wait().unwrap();

    let seen = transport.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    for (url, auth) in seen.iter() {
        assert_eq!(url, "https://api.example.com/v1/users?active=true");
        assert_eq!(auth.as_deref(), Some("Bearer t0k3n"));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Upsertable)]
struct User {
    id: u64,
    name: String,
}

#[test]
fn fetched_users_are_upserted_into_the_store() {
    let transport = Scripted::new(0, r#"[{"id":1,"name":"ada"},{"id":2,"name":"grace"}]"#);
    let network = NetworkProcessor::new(transport);
    let processor = RequestProcessor::new(InMemoryStore::new());

    let users: Outcome<Vec<Payload>> = network
        .execute_json::<Vec<User>>(ExecutionContext::Background, users_request(1))
        .map(|users| users.into_iter().map(Payload::identifiable).collect());
    let results = processor
        .upsert_in_memory(users, "users", VersionConflictStrategy::Overwrite)
        .wait()
        .unwrap()
        .into_results();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status() == Some(RecordStatus::Inserted)));
    assert_eq!(support::all(processor.store(), "users").len(), 2);
}

#[test]
fn failed_network_step_skips_the_next_request() {
    let transport = Scripted::new(0, "{}");
    let network = NetworkProcessor::new(Arc::clone(&transport));

    let err = network
        .process_result(
            Err::<(), _>(RequestError::persistence("local cache unavailable")),
            generators::from_fn(|_| Ok(users_request(1))),
        )
        .wait()
        .unwrap_err();

    assert_eq!(err, RequestError::persistence("local cache unavailable"));
    assert_eq!(transport.calls(), 0);
}

#[test]
fn get_with_body_is_rejected_before_transport() {
    let transport = Scripted::new(0, "{}");
    let network = NetworkProcessor::new(Arc::clone(&transport));
    let invalid = users_request(1).to_builder().with_body("oops").build_unvalidated();

    let err = network
        .execute_blocking(ExecutionContext::Background, invalid)
        .unwrap_err();
    assert_eq!(err, RequestError::validation("GET request cannot carry a body"));
    assert_eq!(transport.calls(), 0);
}
