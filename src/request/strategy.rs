use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Outcome, RequestError};
use crate::record::{compare_values, Record, Upsertable};

/// Policy for an upsert that finds an existing record with the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionConflictStrategy {
    /// Always write the incoming fields.
    Overwrite,
    /// Write only when the incoming `version_field` is strictly greater.
    PreserveIfNewer { version_field: String },
    /// Fail the batch.
    Error,
}

/// What the upsert engine does with a matched record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Overwrite,
    Keep,
}

impl VersionConflictStrategy {
    pub fn preserve_if_newer(version_field: impl Into<String>) -> Self {
        VersionConflictStrategy::PreserveIfNewer {
            version_field: version_field.into(),
        }
    }

    pub fn resolve(
        &self,
        entity: &str,
        incoming: &dyn Upsertable,
        persisted: &Record,
    ) -> Outcome<Resolution> {
        match self {
            VersionConflictStrategy::Overwrite => Ok(Resolution::Overwrite),
            VersionConflictStrategy::Error => Err(RequestError::Conflict {
                entity: entity.to_string(),
                identity: incoming.identity().to_string(),
            }),
            VersionConflictStrategy::PreserveIfNewer { version_field } => {
                let update = incoming.update_dictionary();
                let newer = match (update.get(version_field), persisted.get(version_field)) {
                    (None, _) => false,
                    (Some(_), None) => true,
                    (Some(new), Some(old)) => compare_values(new, old) == Ordering::Greater,
                };
                Ok(if newer {
                    Resolution::Overwrite
                } else {
                    Resolution::Keep
                })
            }
        }
    }
}

impl fmt::Display for VersionConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConflictStrategy::Overwrite => write!(f, "overwrite"),
            VersionConflictStrategy::PreserveIfNewer { version_field } => {
                write!(f, "preserve-if-newer({})", version_field)
            }
            VersionConflictStrategy::Error => write!(f, "error"),
        }
    }
}
