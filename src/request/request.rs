use std::fmt;
use std::time::Duration;

use super::builder::RequestBuilder;
use super::strategy::VersionConflictStrategy;
use super::{Operation, OperationMode, RequestType};
use crate::error::{Outcome, RequestError};
use crate::query::{Predicate, Query, SortKey};
use crate::record::Payload;

/// One database operation. Built once, consumed by a processor, never mutated.
#[derive(Debug, Clone)]
pub struct Request {
    pub(super) operation: Option<Operation>,
    pub(super) mode: OperationMode,
    pub(super) entity_name: Option<String>,
    pub(super) predicate: Option<Predicate>,
    pub(super) sort: Vec<SortKey>,
    pub(super) fetch_limit: Option<usize>,
    pub(super) fetch_offset: usize,
    pub(super) payload: Vec<Payload>,
    pub(super) strategy: Option<VersionConflictStrategy>,
    pub(super) section_name: Option<String>,
    pub(super) excluded_middlewares: Vec<String>,
    pub(super) retry_count: usize,
    pub(super) retry_delay: Duration,
    pub(super) middleware_enabled: bool,
    pub(super) description: Option<String>,
}

impl Request {
    pub(super) fn empty() -> Self {
        Self {
            operation: None,
            mode: OperationMode::Queued,
            entity_name: None,
            predicate: None,
            sort: Vec::new(),
            fetch_limit: None,
            fetch_offset: 0,
            payload: Vec::new(),
            strategy: None,
            section_name: None,
            excluded_middlewares: Vec::new(),
            retry_count: 1,
            retry_delay: Duration::ZERO,
            middleware_enabled: true,
            description: None,
        }
    }

    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    /// A builder seeded with every field of this request.
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder::from_request(self)
    }

    pub fn operation(&self) -> Outcome<Operation> {
        self.operation
            .ok_or_else(|| RequestError::validation("operation cannot be empty"))
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn entity_name(&self) -> Outcome<&str> {
        match self.entity_name.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(RequestError::validation("entity name cannot be empty")),
        }
    }

    pub fn predicate(&self) -> Outcome<&Predicate> {
        self.predicate.as_ref().ok_or_else(|| {
            let op = self
                .operation
                .map(|op| op.to_string())
                .unwrap_or_else(|| "request".to_string());
            RequestError::validation(format!("predicate required for {}", op))
        })
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn fetch_limit(&self) -> Option<usize> {
        self.fetch_limit
    }

    pub fn fetch_offset(&self) -> usize {
        self.fetch_offset
    }

    pub fn payload(&self) -> &[Payload] {
        &self.payload
    }

    pub fn version_conflict_strategy(&self) -> Outcome<&VersionConflictStrategy> {
        self.strategy
            .as_ref()
            .ok_or_else(|| RequestError::validation("version conflict strategy required for upsert"))
    }

    /// Grouping key for live-query consumers.
    pub fn section_name(&self) -> Option<&str> {
        self.section_name.as_deref()
    }

    pub fn query(&self) -> Outcome<Query> {
        Ok(Query {
            entity: self.entity_name()?.to_string(),
            predicate: self.predicate()?.clone(),
            sort: self.sort.clone(),
            limit: self.fetch_limit,
            offset: self.fetch_offset,
        })
    }

    /// Check every field the operation requires. Performs no I/O.
    pub fn validate(&self) -> Outcome<()> {
        let operation = self.operation()?;
        if operation != Operation::Persist {
            self.entity_name()?;
        }

        match operation {
            Operation::Fetch | Operation::DeleteByQuery => {
                self.predicate()?;
            }
            Operation::Upsert => {
                self.version_conflict_strategy()?;
                if let Some(plain) = self.payload.iter().find(|p| p.upsertable().is_none()) {
                    return Err(RequestError::validation(format!(
                        "upsert payload must be identifiable, got plain record {}",
                        plain.representation()
                    )));
                }
            }
            Operation::Save | Operation::DeleteByData | Operation::Persist => {}
        }

        Ok(())
    }
}

impl RequestType for Request {
    fn retries(&self) -> usize {
        self.retry_count.max(1)
    }

    fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    fn middleware_enabled(&self) -> bool {
        self.middleware_enabled
    }

    fn excluded_middlewares(&self) -> &[String] {
        &self.excluded_middlewares
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ops = match (self.operation, &self.predicate) {
            (Some(Operation::Fetch), Some(predicate)) => {
                format!("fetch with predicate {:?} and sort {:?}", predicate, self.sort)
            }
            (Some(op), _) => op.to_string(),
            (None, _) => "INVALID OPERATION".to_string(),
        };
        write!(
            f,
            "Performing {}. Description: {}",
            ops,
            self.description.as_deref().unwrap_or("NONE")
        )
    }
}
