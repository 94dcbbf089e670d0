use std::time::Duration;

use super::request::Request;
use super::strategy::VersionConflictStrategy;
use super::{Operation, OperationMode};
use crate::error::Outcome;
use crate::query::{Predicate, SortKey};
use crate::record::Payload;

/// Fluent builder for [`Request`]. Each setter takes and returns the builder.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            request: Request::empty(),
        }
    }

    /// Seed a builder from an existing request (copy-and-extend).
    pub fn from_request(request: &Request) -> Self {
        Self {
            request: request.clone(),
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.request.operation = Some(operation);
        self
    }

    pub fn with_mode(mut self, mode: OperationMode) -> Self {
        self.request.mode = mode;
        self
    }

    pub fn with_entity_name(mut self, entity_name: impl Into<String>) -> Self {
        self.request.entity_name = Some(entity_name.into());
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.request.predicate = Some(predicate);
        self
    }

    /// AND `predicate` onto the current predicate, or set it if there is none.
    pub fn and_predicate(mut self, predicate: Predicate) -> Self {
        self.request.predicate = Some(match self.request.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// OR `predicate` onto the current predicate, or set it if there is none.
    pub fn or_predicate(mut self, predicate: Predicate) -> Self {
        self.request.predicate = Some(match self.request.predicate.take() {
            Some(existing) => existing.or(predicate),
            None => predicate,
        });
        self
    }

    /// Append sort keys after any already present.
    pub fn with_sort(mut self, keys: impl IntoIterator<Item = SortKey>) -> Self {
        self.request.sort.extend(keys);
        self
    }

    pub fn add_ascending_sort(mut self, field: impl Into<String>) -> Self {
        self.request.sort.push(SortKey::ascending(field));
        self
    }

    pub fn add_descending_sort(mut self, field: impl Into<String>) -> Self {
        self.request.sort.push(SortKey::descending(field));
        self
    }

    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.request.fetch_limit = Some(limit);
        self
    }

    pub fn with_fetch_offset(mut self, offset: usize) -> Self {
        self.request.fetch_offset = offset;
        self
    }

    /// Append payload items after any already present.
    pub fn with_payload(mut self, payload: impl IntoIterator<Item = Payload>) -> Self {
        self.request.payload.extend(payload);
        self
    }

    pub fn add_payload(mut self, item: Payload) -> Self {
        self.request.payload.push(item);
        self
    }

    pub fn with_strategy(mut self, strategy: VersionConflictStrategy) -> Self {
        self.request.strategy = Some(strategy);
        self
    }

    pub fn with_section_name(mut self, section_name: impl Into<String>) -> Self {
        self.request.section_name = Some(section_name.into());
        self
    }

    /// Skip the named middleware for this request only.
    pub fn without_middleware(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.request.excluded_middlewares.contains(&name) {
            self.request.excluded_middlewares.push(name);
        }
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.request.retry_count = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.request.retry_delay = delay;
        self
    }

    pub fn with_middleware_enabled(mut self, enabled: bool) -> Self {
        self.request.middleware_enabled = enabled;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.request.description = Some(description.into());
        self
    }

    /// Validate and return the request.
    pub fn build(self) -> Outcome<Request> {
        self.request.validate()?;
        Ok(self.request)
    }

    /// Return the request without validation; processors still validate before dispatch.
    pub fn build_unvalidated(self) -> Request {
        self.request
    }
}
