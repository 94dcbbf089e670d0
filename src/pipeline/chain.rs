use std::fmt;

use tracing::{debug, warn};

use super::retry;
use crate::error::{Outcome, RequestError};
use crate::middleware::MiddlewareManager;
use crate::request::RequestType;

/// The request, output and error middleware of one processor, and the
/// validate, transform, dispatch and retry sequence they wrap.
pub struct MiddlewareChain<R, O> {
    pub request: MiddlewareManager<R>,
    pub output: MiddlewareManager<O>,
    pub error: MiddlewareManager<RequestError>,
}

impl<R, O> Default for MiddlewareChain<R, O> {
    fn default() -> Self {
        Self {
            request: MiddlewareManager::new(),
            output: MiddlewareManager::new(),
            error: MiddlewareManager::new(),
        }
    }
}

impl<R, O> Clone for MiddlewareChain<R, O> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            output: self.output.clone(),
            error: self.error.clone(),
        }
    }
}

impl<R, O> fmt::Debug for MiddlewareChain<R, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("request", &self.request)
            .field("output", &self.output)
            .field("error", &self.error)
            .finish()
    }
}

impl<R: RequestType, O> MiddlewareChain<R, O> {
    /// Validate `request`, then up to `retries()` times: apply request
    /// middleware, re-validate and dispatch. The outcome then passes through
    /// the output or error middleware.
    ///
    /// A request that fails its first validation never reaches `dispatch`.
    pub fn run<V, D>(&self, request: R, validate: V, mut dispatch: D) -> Outcome<O>
    where
        V: Fn(&R) -> Outcome<()>,
        D: FnMut(&R) -> Outcome<O>,
    {
        validate(&request)?;

        let enabled = request.middleware_enabled();
        let excluded = request.excluded_middlewares().to_vec();

        let result = retry(request.retries(), request.retry_delay(), |attempt| {
            let prepared = self.request.apply(request.clone(), enabled, &excluded)?;
            validate(&prepared)?;
            debug!(attempt, description = prepared.description().unwrap_or("NONE"), "dispatching");
            dispatch(&prepared)
        });

        match result {
            Ok(output) => self.output.apply(output, enabled, &excluded),
            Err(err) => {
                warn!(error = %err, "request failed");
                Err(self.error.apply(err, enabled, &excluded)?)
            }
        }
    }
}
