use thiserror::Error;

/// Boxed error returned by middleware transforms and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Success/failure wrapper surfaced by every execution path.
pub type Outcome<T> = Result<T, RequestError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// A request is missing a field its operation requires.
    #[error("invalid request: {0}")]
    Validation(String),
    /// The persistence collaborator failed to read or write.
    #[error("persistence error: {0}")]
    Persistence(String),
    /// A middleware filter aborted the chain.
    #[error("middleware '{name}' failed: {reason}")]
    Middleware { name: String, reason: String },
    /// Version-conflict strategy `Error` met an existing record.
    #[error("version conflict on {entity}: record {identity} already exists")]
    Conflict { entity: String, identity: String },
    /// The network collaborator failed.
    #[error("network error: {0}")]
    Network(String),
    /// A blocking operation was requested from an interactive context.
    #[error("blocking operation '{0}' must not run on an interactive context")]
    InteractiveContext(String),
    /// The operation handle was cancelled before a result was delivered.
    #[error("operation cancelled")]
    Cancelled,
    /// The operation panicked on its worker. The worker keeps serving.
    #[error("operation panicked: {0}")]
    Panicked(String),
    /// Entity lock acquisition failed.
    #[error("lock error: {0}")]
    Lock(String),
}

impl RequestError {
    pub fn validation(message: impl Into<String>) -> Self {
        RequestError::Validation(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        RequestError::Persistence(message.into())
    }

    /// Whether repeating the same operation could succeed.
    ///
    /// Malformed requests, conflicts, guard violations and cancellations are
    /// deterministic and are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RequestError::Persistence(_)
                | RequestError::Middleware { .. }
                | RequestError::Network(_)
                | RequestError::Lock(_)
        )
    }
}

impl From<crate::lock::LockError> for RequestError {
    fn from(err: crate::lock::LockError) -> Self {
        RequestError::Lock(err.to_string())
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        RequestError::Persistence(err.to_string())
    }
}
