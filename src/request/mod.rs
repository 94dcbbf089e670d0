//! Requests - immutable descriptions of one store operation.
//!
//! ## Example
//!
//! ```ignore
//! use storeflow::{Operation, Predicate, Request, SortKey};
//!
//! let request = Request::builder()
//!     .with_operation(Operation::Fetch)
//!     .with_entity_name("users")
//!     .with_predicate(Predicate::gt("age", 18))
//!     .add_ascending_sort("name")
//!     .with_retries(3)
//!     .build()?;
//!
//! // Seed a new request from an existing one and page it.
//! let page_two = request.to_builder().with_fetch_offset(20).with_fetch_limit(20).build()?;
//! ```

mod builder;
#[allow(clippy::module_inception)]
mod request;
mod strategy;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use builder::RequestBuilder;
pub use request::Request;
pub use strategy::{Resolution, VersionConflictStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Fetch,
    Save,
    Upsert,
    DeleteByData,
    DeleteByQuery,
    Persist,
}

impl Operation {
    /// Operations that write to an entity and take its writer lock.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Operation::Save | Operation::Upsert | Operation::DeleteByData | Operation::DeleteByQuery
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Fetch => "fetch",
            Operation::Save => "save",
            Operation::Upsert => "upsert",
            Operation::DeleteByData => "delete-by-data",
            Operation::DeleteByQuery => "delete-by-query",
            Operation::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Which executor lane runs the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationMode {
    /// Serialized with every other queued request.
    #[default]
    Queued,
    /// Runs on the shared worker pool.
    Concurrent,
}

/// Settings every request kind exposes to the shared pipeline.
pub trait RequestType: Clone + fmt::Debug + Send + Sync + 'static {
    /// Total attempts, never below 1.
    fn retries(&self) -> usize;

    fn retry_delay(&self) -> Duration;

    fn middleware_enabled(&self) -> bool;

    /// Middleware names this request opts out of.
    fn excluded_middlewares(&self) -> &[String];

    fn description(&self) -> Option<&str>;
}
