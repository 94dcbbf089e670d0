//! storeflow - declarative requests against record stores.
//!
//! A [`Request`] describes one operation (fetch, save, upsert, delete,
//! persist). A [`RequestProcessor`] validates it, runs it through request
//! middleware, dispatches it to the store with retries, and passes the
//! outcome through output or error middleware. Upserts go through the
//! [`UpsertEngine`], which matches incoming items to stored records by
//! identity and resolves conflicts with a [`VersionConflictStrategy`].
//!
//! ## Example
//!
//! ```ignore
//! use storeflow::{InMemoryStore, Payload, RequestProcessor, Upsertable, VersionConflictStrategy};
//!
//! #[derive(Debug, serde::Serialize, Upsertable)]
//! struct User {
//!     id: String,
//!     name: String,
//! }
//!
//! let processor = RequestProcessor::new(InMemoryStore::new());
//! let users = vec![Payload::identifiable(User { id: "a".into(), name: "Ada".into() })];
//! let upserted = processor.upsert_in_memory(Ok(users), "users", VersionConflictStrategy::Overwrite);
//! processor.persist_to_durable(upserted.wait()).wait()?;
//! ```

extern crate self as storeflow;

pub mod config;
pub mod error;
pub mod executor;
pub mod lock;
pub mod middleware;
pub mod network;
pub mod pipeline;
pub mod processor;
pub mod query;
pub mod record;
pub mod request;
pub mod result;
pub mod store;
pub mod upsert;

pub use config::{ConfigError, ProcessorConfig, StoreConfig, StoreflowConfig};
pub use error::{BoxError, Outcome, RequestError};
pub use executor::{ExecutionContext, Executor, OperationHandle};
pub use lock::{InMemoryLockManager, LockError, LockGuard, LockManager, LockRelease};
pub use middleware::MiddlewareManager;
pub use network::{Method, NetworkProcessor, NetworkRequest, NetworkTransport};
pub use pipeline::{generators, Generator, MiddlewareChain};
pub use processor::{ProcessorBuilder, RequestProcessor};
pub use query::{Predicate, Query, SortKey};
pub use record::{Fields, Identifiable, Identity, ObjectId, Payload, Record, UpsertRecord, Upsertable};
pub use request::{
    Operation, OperationMode, Request, RequestBuilder, RequestType, Resolution, VersionConflictStrategy,
};
pub use result::{Output, RecordResult, RecordStatus};
pub use store::{ChangeEvent, ChangeSet, Context, InMemoryStore, PersistenceStore};
pub use upsert::UpsertEngine;

#[cfg(feature = "http")]
pub use network::HttpTransport;

// Derive macro lives in the macro namespace, so it shares the trait's name.
pub use storeflow_macros::Upsertable;

#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
