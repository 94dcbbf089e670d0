//! RequestProcessor - runs requests against a store through the shared pipeline.
//!
//! Every execution follows the same steps:
//!
//! 1. the interactive guard (blocking calls only, when enabled),
//! 2. validation, which fails before the store is touched,
//! 3. request middleware, dispatch to the operation's path, repeated up to
//!    `retries()` times while the error is retryable,
//! 4. output middleware on success or error middleware on failure.
//!
//! Write operations hold a per-entity lock for the duration of each attempt
//! when `entity_locking` is on, so overlapping upserts of one entity run one
//! after another.
//!
//! ## Example
//!
//! ```ignore
//! use storeflow::{ExecutionContext, InMemoryStore, Operation, Predicate, Request, RequestProcessor};
//!
//! let processor = RequestProcessor::builder()
//!     .store(InMemoryStore::new())
//!     .request_middleware("audit", |request: Request| Ok(request))
//!     .build()?;
//!
//! let request = Request::builder()
//!     .with_operation(Operation::Fetch)
//!     .with_entity_name("users")
//!     .with_predicate(Predicate::All)
//!     .build()?;
//!
//! let users = processor.fetch(ExecutionContext::Background, request)?;
//! let handle = processor.execute(processor.persist_request()?);
//! handle.wait()?;
//! ```

mod composite;
mod dispatch;

use std::sync::Arc;

use tracing::debug;

use crate::config::ProcessorConfig;
use crate::error::{BoxError, Outcome, RequestError};
use crate::executor::{ExecutionContext, Executor, OperationHandle};
use crate::lock::{InMemoryLockManager, LockManager};
use crate::pipeline::{Generator, MiddlewareChain};
use crate::record::Record;
use crate::request::{Operation, Request};
use crate::result::{Output, RecordResult};
use crate::store::PersistenceStore;

struct Shared<S> {
    store: S,
    config: ProcessorConfig,
    locks: InMemoryLockManager,
    chain: MiddlewareChain<Request, Output>,
}

impl<S: PersistenceStore> Shared<S> {
    fn execute_blocking(&self, context: ExecutionContext, request: Request) -> Outcome<Output> {
        if self.config.guard_interactive {
            let label = request
                .operation()
                .map(|op| op.to_string())
                .unwrap_or_else(|_| "request".to_string());
            context.ensure_background(label)?;
        }

        debug!(request = %request, "executing");
        self.chain
            .run(request, Request::validate, |prepared| self.dispatch(prepared))
    }

    fn dispatch(&self, request: &Request) -> Outcome<Output> {
        let operation = request.operation()?;
        let _guard = if operation.is_write() && self.config.entity_locking {
            Some(self.locks.acquire(request.entity_name()?)?)
        } else {
            None
        };
        dispatch::dispatch(&self.store, request)
    }
}

/// Executes requests against a [`PersistenceStore`].
///
/// Clone-friendly; clones share the store, middleware and workers.
pub struct RequestProcessor<S> {
    shared: Arc<Shared<S>>,
    executor: Executor,
}

impl<S> Clone for RequestProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            executor: self.executor.clone(),
        }
    }
}

impl<S: PersistenceStore + 'static> RequestProcessor<S> {
    pub fn builder() -> ProcessorBuilder<S> {
        ProcessorBuilder::new()
    }

    /// A processor over `store` with default config and no middleware.
    pub fn new(store: S) -> Self {
        Self::from_parts(store, ProcessorConfig::default(), MiddlewareChain::default())
    }

    fn from_parts(store: S, config: ProcessorConfig, chain: MiddlewareChain<Request, Output>) -> Self {
        let executor = Executor::new(config.worker_threads);
        Self {
            shared: Arc::new(Shared {
                store,
                config,
                locks: InMemoryLockManager::new(),
                chain,
            }),
            executor,
        }
    }

    pub fn store(&self) -> &S {
        &self.shared.store
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.shared.config
    }

    /// Run `request` on the calling thread.
    pub fn execute_blocking(&self, context: ExecutionContext, request: Request) -> Outcome<Output> {
        self.shared.execute_blocking(context, request)
    }

    /// Run `request` on the executor lane its mode selects.
    pub fn execute(&self, request: Request) -> OperationHandle<Output> {
        let shared = Arc::clone(&self.shared);
        self.executor.submit(request.mode(), move || {
            shared.execute_blocking(ExecutionContext::Background, request)
        })
    }

    /// Build the next request from a previous step and execute it.
    ///
    /// A failed `previous` is passed through without calling `generator`.
    pub fn process_result<P>(&self, previous: Outcome<P>, generator: Generator<P>) -> OperationHandle<Output> {
        match previous.and_then(generator) {
            Ok(request) => self.execute(request),
            Err(err) => Executor::ready(Err(err)),
        }
    }

    pub fn process_result_blocking<P>(
        &self,
        context: ExecutionContext,
        previous: Outcome<P>,
        generator: Generator<P>,
    ) -> Outcome<Output> {
        let request = previous.and_then(generator)?;
        self.execute_blocking(context, request)
    }

    pub fn fetch(&self, context: ExecutionContext, request: Request) -> Outcome<Vec<Record>> {
        expect_operation(&request, &[Operation::Fetch])?;
        Ok(self.execute_blocking(context, request)?.into_records())
    }

    pub fn save(&self, context: ExecutionContext, request: Request) -> Outcome<Vec<RecordResult>> {
        expect_operation(&request, &[Operation::Save])?;
        Ok(self.execute_blocking(context, request)?.into_results())
    }

    pub fn upsert(&self, context: ExecutionContext, request: Request) -> Outcome<Vec<RecordResult>> {
        expect_operation(&request, &[Operation::Upsert])?;
        Ok(self.execute_blocking(context, request)?.into_results())
    }

    /// Delete by data or by query.
    pub fn delete(&self, context: ExecutionContext, request: Request) -> Outcome<Vec<RecordResult>> {
        expect_operation(&request, &[Operation::DeleteByData, Operation::DeleteByQuery])?;
        Ok(self.execute_blocking(context, request)?.into_results())
    }

    pub fn persist(&self, context: ExecutionContext, request: Request) -> Outcome<()> {
        expect_operation(&request, &[Operation::Persist])?;
        self.execute_blocking(context, request).map(|_| ())
    }
}

fn expect_operation(request: &Request, allowed: &[Operation]) -> Outcome<()> {
    let operation = request.operation()?;
    if allowed.contains(&operation) {
        return Ok(());
    }
    Err(RequestError::validation(format!(
        "expected a {} request, got {}",
        allowed
            .iter()
            .map(|op| op.to_string())
            .collect::<Vec<_>>()
            .join(" or "),
        operation
    )))
}

/// Assembles a [`RequestProcessor`].
pub struct ProcessorBuilder<S> {
    store: Option<S>,
    config: ProcessorConfig,
    chain: MiddlewareChain<Request, Output>,
}

impl<S: PersistenceStore + 'static> Default for ProcessorBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PersistenceStore + 'static> ProcessorBuilder<S> {
    pub fn new() -> Self {
        Self {
            store: None,
            config: ProcessorConfig::default(),
            chain: MiddlewareChain::default(),
        }
    }

    pub fn store(mut self, store: S) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn request_middleware<F>(mut self, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Request) -> Result<Request, BoxError> + Send + Sync + 'static,
    {
        self.chain.request = self.chain.request.register(name, transform);
        self
    }

    pub fn output_middleware<F>(mut self, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Output) -> Result<Output, BoxError> + Send + Sync + 'static,
    {
        self.chain.output = self.chain.output.register(name, transform);
        self
    }

    pub fn error_middleware<F>(mut self, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(RequestError) -> Result<RequestError, BoxError> + Send + Sync + 'static,
    {
        self.chain.error = self.chain.error.register(name, transform);
        self
    }

    pub fn build(self) -> Outcome<RequestProcessor<S>> {
        let store = self
            .store
            .ok_or_else(|| RequestError::validation("processor requires a store"))?;
        if self.config.worker_threads == 0 {
            return Err(RequestError::validation("worker_threads must be at least 1"));
        }
        Ok(RequestProcessor::from_parts(store, self.config, self.chain))
    }
}
