//! Network half of the pipeline: HTTP request descriptions, the transport
//! collaborator and a processor sharing the database path's retry,
//! middleware and generator contract.
//!
//! ## Example
//!
//! ```ignore
//! use storeflow::network::{HttpTransport, Method, NetworkProcessor, NetworkRequest};
//!
//! let processor = NetworkProcessor::builder()
//!     .transport(HttpTransport::new()?)
//!     .request_middleware("auth", |request: NetworkRequest| {
//!         Ok(request.to_builder().add_header("authorization", "Bearer token").build_unvalidated())
//!     })
//!     .build()?;
//!
//! let request = NetworkRequest::builder()
//!     .with_method(Method::Get)
//!     .with_base_url("https://api.example.com")
//!     .with_path("users")
//!     .with_retries(3)
//!     .build()?;
//!
//! let body = processor.execute(request).wait()?;
//! ```

#[cfg(feature = "http")]
mod http;
mod processor;
mod request;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Outcome;

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use processor::{NetworkProcessor, NetworkProcessorBuilder};
pub use request::{NetworkRequest, NetworkRequestBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Performs one HTTP exchange and returns the response body.
pub trait NetworkTransport: Send + Sync {
    fn execute(&self, request: &NetworkRequest) -> Outcome<Vec<u8>>;
}

impl<T: NetworkTransport + ?Sized> NetworkTransport for Arc<T> {
    fn execute(&self, request: &NetworkRequest) -> Outcome<Vec<u8>> {
        (**self).execute(request)
    }
}
