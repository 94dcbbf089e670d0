use std::fmt;

use crate::error::RequestError;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Inserted,
    Updated,
    /// Matched but kept, the persisted version was not older.
    Unchanged,
    Deleted,
}

/// Outcome for one payload item or one affected record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordResult {
    Success {
        representation: String,
        status: RecordStatus,
    },
    Failure {
        representation: String,
        error: RequestError,
    },
}

impl RecordResult {
    pub fn success(representation: impl Into<String>, status: RecordStatus) -> Self {
        RecordResult::Success {
            representation: representation.into(),
            status,
        }
    }

    pub fn failure(representation: impl Into<String>, error: RequestError) -> Self {
        RecordResult::Failure {
            representation: representation.into(),
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RecordResult::Success { .. })
    }

    pub fn representation(&self) -> &str {
        match self {
            RecordResult::Success { representation, .. }
            | RecordResult::Failure { representation, .. } => representation,
        }
    }

    pub fn status(&self) -> Option<RecordStatus> {
        match self {
            RecordResult::Success { status, .. } => Some(*status),
            RecordResult::Failure { .. } => None,
        }
    }
}

impl fmt::Display for RecordResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordResult::Success {
                representation,
                status,
            } => write!(f, "{:?} {}", status, representation),
            RecordResult::Failure {
                representation,
                error,
            } => write!(f, "failed {}: {}", representation, error),
        }
    }
}

/// What a processed request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Fetched records.
    Records(Vec<Record>),
    /// Per-item results of a save, upsert or delete.
    Results(Vec<RecordResult>),
    /// Durable flush finished.
    Persisted,
}

impl Output {
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Output::Records(records) => records,
            _ => Vec::new(),
        }
    }

    pub fn into_results(self) -> Vec<RecordResult> {
        match self {
            Output::Results(results) => results,
            _ => Vec::new(),
        }
    }
}
