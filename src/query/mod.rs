//! Query constraints: predicates, sort keys and paging.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{compare_values, value_to_key, Identity, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    All,
    None,
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    Lt(String, Value),
    Le(String, Value),
    In(String, Vec<Value>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Ne(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Gt(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Lt(field.into(), value.into())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            this => Predicate::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            this => Predicate::Or(vec![this, other]),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Matches any record carrying one of `identities`. Valueless identities are skipped.
    pub fn identities(identities: &[Identity]) -> Self {
        let parts: Vec<Predicate> = identities
            .iter()
            .filter_map(|identity| {
                identity
                    .value
                    .as_ref()
                    .map(|value| Predicate::Eq(identity.key.clone(), Value::String(value.clone())))
            })
            .collect();
        if parts.is_empty() {
            Predicate::None
        } else {
            Predicate::Or(parts)
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::All => true,
            Predicate::None => false,
            Predicate::Eq(field, value) => field_equals(record, field, value),
            Predicate::Ne(field, value) => !field_equals(record, field, value),
            Predicate::Gt(field, value) => field_cmp(record, field, value) == Some(Ordering::Greater),
            Predicate::Ge(field, value) => matches!(
                field_cmp(record, field, value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Predicate::Lt(field, value) => field_cmp(record, field, value) == Some(Ordering::Less),
            Predicate::Le(field, value) => matches!(
                field_cmp(record, field, value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Predicate::In(field, values) => values.iter().any(|v| field_equals(record, field, v)),
            Predicate::And(parts) => parts.iter().all(|p| p.matches(record)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(record)),
            Predicate::Not(inner) => !inner.matches(record),
        }
    }
}

// Strings and numbers holding the same identity text compare equal, so an
// identity predicate built from "42" finds a record storing 42.
fn field_equals(record: &Record, field: &str, value: &Value) -> bool {
    match record.get(field) {
        Some(stored) if stored == value => true,
        Some(stored) => match (value_to_key(stored), value_to_key(value)) {
            (Some(a), Some(b)) => {
                a == b && !matches!(stored, Value::Array(_) | Value::Object(_))
            }
            _ => false,
        },
        None => value.is_null(),
    }
}

fn field_cmp(record: &Record, field: &str, value: &Value) -> Option<Ordering> {
    record.get(field).map(|stored| compare_values(stored, value))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub ascending: bool,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }
}

/// A fully resolved read over one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub entity: String,
    pub predicate: Predicate,
    pub sort: Vec<SortKey>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new(entity: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            entity: entity.into(),
            predicate,
            sort: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    pub fn all(entity: impl Into<String>) -> Self {
        Self::new(entity, Predicate::All)
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.entity() == self.entity && self.predicate.matches(record)
    }

    /// Filter, stable-sort, then page `records`.
    pub fn apply(&self, records: impl IntoIterator<Item = Record>) -> Vec<Record> {
        let mut matched: Vec<Record> = records.into_iter().filter(|r| self.matches(r)).collect();

        if !self.sort.is_empty() {
            matched.sort_by(|a, b| {
                for key in &self.sort {
                    let ordering = match (a.get(&key.field), b.get(&key.field)) {
                        (Some(x), Some(y)) => compare_values(x, y),
                        (None, Some(_)) => Ordering::Less,
                        (Some(_), None) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    };
                    let ordering = if key.ascending { ordering } else { ordering.reverse() };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let paged = matched.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => paged.take(limit).collect(),
            None => paged.collect(),
        }
    }
}
