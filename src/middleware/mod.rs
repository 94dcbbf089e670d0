//! Middleware - ordered, named transforms applied around execution.
//!
//! A processor carries three managers: one transforming requests before
//! dispatch, one transforming successful outputs and one transforming errors.
//!
//! ## Example
//!
//! ```ignore
//! use storeflow::{MiddlewareManager, Request};
//!
//! let middlewares = MiddlewareManager::<Request>::new()
//!     .register("tag", |request: Request| {
//!         Ok(request.to_builder().with_description("tagged").build_unvalidated())
//!     });
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{BoxError, Outcome, RequestError};

type Transform<T> = Arc<dyn Fn(T) -> Result<T, BoxError> + Send + Sync>;

struct Middleware<T> {
    name: String,
    transform: Transform<T>,
}

impl<T> Clone for Middleware<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            transform: Arc::clone(&self.transform),
        }
    }
}

/// Named transforms applied strictly in registration order.
pub struct MiddlewareManager<T> {
    middlewares: Vec<Middleware<T>>,
}

impl<T> Default for MiddlewareManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MiddlewareManager<T> {
    fn clone(&self) -> Self {
        Self {
            middlewares: self.middlewares.clone(),
        }
    }
}

impl<T> fmt::Debug for MiddlewareManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareManager")
            .field("names", &self.names())
            .finish()
    }
}

impl<T> MiddlewareManager<T> {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Register a transform. Re-registering a name replaces it in place.
    pub fn register<F>(mut self, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(T) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        let transform: Transform<T> = Arc::new(transform);
        match self.middlewares.iter_mut().find(|m| m.name == name) {
            Some(existing) => existing.transform = transform,
            None => self.middlewares.push(Middleware { name, transform }),
        }
        self
    }

    pub fn remove(mut self, name: &str) -> Self {
        self.middlewares.retain(|m| m.name != name);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.middlewares.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run the chain. The first failing transform aborts it.
    pub fn apply(&self, value: T, enabled: bool, excluded: &[String]) -> Outcome<T> {
        if !enabled {
            return Ok(value);
        }

        let mut value = value;
        for middleware in &self.middlewares {
            if excluded.iter().any(|name| name == &middleware.name) {
                debug!(middleware = %middleware.name, "middleware skipped");
                continue;
            }
            value = (middleware.transform)(value).map_err(|err| RequestError::Middleware {
                name: middleware.name.clone(),
                reason: err.to_string(),
            })?;
        }
        Ok(value)
    }
}
