//! Records - the persisted representation and the capabilities payloads expose.
//!
//! A [`Record`] is what the store holds: an entity name, a store-assigned
//! [`ObjectId`] and a map of fields. Payload data handed to a request is a
//! [`Payload`], a closed sum type that states up front whether an item can be
//! identity-matched against the store and whether version-conflict resolution
//! applies to it.
//!
//! ## Example
//!
//! ```ignore
//! use storeflow::{Payload, UpsertRecord};
//!
//! let user = UpsertRecord::new("id", "u-1")
//!     .with_field("name", "Ada")
//!     .with_field("updatedAt", 1_700_000_000);
//!
//! let payload = vec![Payload::versioned(user)];
//! ```

mod value;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use value::{compare_values, value_to_key};

/// Field name to value mapping.
pub type Fields = BTreeMap<String, Value>;

/// Store-assigned handle for a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: Option<ObjectId>,
    entity: String,
    fields: Fields,
}

impl Record {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            id: None,
            entity: entity.into(),
            fields: Fields::new(),
        }
    }

    pub fn from_fields(entity: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: None,
            entity: entity.into(),
            fields,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The store handle, `None` until the record has been constructed in a context.
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Overwrite the given fields one by one. Fields not named in `update` survive.
    pub fn apply(&mut self, update: &Fields) {
        for (key, value) in update {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// The value stored under `key`, projected to its identity string.
    pub fn identity_value(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(value_to_key)
    }

    /// Whether this record carries the identity of `other`.
    ///
    /// Items without a primary value never match a persisted record.
    pub fn identifiable_as(&self, other: &dyn Identifiable) -> bool {
        match other.primary_value() {
            Some(value) => self.identity_value(other.primary_key()).as_deref() == Some(value.as_str()),
            None => false,
        }
    }

    pub fn matches_identity(&self, identity: &Identity) -> bool {
        match &identity.value {
            Some(value) => self.identity_value(&identity.key).as_deref() == Some(value.as_str()),
            None => false,
        }
    }

    pub fn representation(&self) -> String {
        match self.id {
            Some(id) => format!("{}:{}", self.entity, id),
            None => format!(
                "{}:{}",
                self.entity,
                serde_json::to_string(&self.fields).unwrap_or_default()
            ),
        }
    }

    pub(crate) fn assign_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }

    pub(crate) fn set_entity(&mut self, entity: &str) {
        self.entity = entity.to_string();
    }
}

/// The (key, value) pair naming a logical record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub key: String,
    pub value: Option<String>,
}

impl Identity {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => write!(f, "{}=nil", self.key),
        }
    }
}

/// Items that can be looked up in the store by primary key.
pub trait Identifiable: Send + Sync {
    /// Name of the field holding the primary value.
    fn primary_key(&self) -> &str;

    fn primary_value(&self) -> Option<String>;

    fn identity(&self) -> Identity {
        Identity {
            key: self.primary_key().to_string(),
            value: self.primary_value(),
        }
    }

    fn identifiable_as(&self, other: &dyn Identifiable) -> bool {
        self.primary_key() == other.primary_key() && self.primary_value() == other.primary_value()
    }
}

/// Items that can be updated in place or inserted when absent.
pub trait Upsertable: Identifiable + fmt::Debug {
    /// Fields written onto the matching persisted record.
    fn update_dictionary(&self) -> Fields;

    /// Value used by the default [`Upsertable::compare`].
    fn ordering_value(&self) -> Option<Value> {
        None
    }

    /// Processing order within a batch. Items without an ordering value come
    /// first. `Equal` keeps input order.
    fn compare(&self, other: &dyn Upsertable) -> Ordering {
        match (self.ordering_value(), other.ordering_value()) {
            (Some(a), Some(b)) => compare_values(&a, &b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// The record inserted when no persisted counterpart exists.
    fn to_record(&self, entity: &str) -> Record {
        let mut fields = self.update_dictionary();
        if let Some(value) = self.primary_value() {
            fields
                .entry(self.primary_key().to_string())
                .or_insert(Value::String(value));
        }
        Record::from_fields(entity, fields)
    }

    /// Label carried by this item's result entry.
    fn representation(&self) -> String {
        self.identity().to_string()
    }
}

/// One payload item, tagged with the capabilities it offers.
#[derive(Debug, Clone)]
pub enum Payload {
    /// No identity. Inserted as-is, deleted by object id or exact field match.
    Plain(Record),
    /// Identity-matched; upserts overwrite without version checks.
    Identifiable(Arc<dyn Upsertable>),
    /// Identity-matched; upserts go through the request's conflict strategy.
    Versioned(Arc<dyn Upsertable>),
}

impl Payload {
    pub fn plain(record: Record) -> Self {
        Payload::Plain(record)
    }

    pub fn identifiable<U: Upsertable + 'static>(item: U) -> Self {
        Payload::Identifiable(Arc::new(item))
    }

    pub fn versioned<U: Upsertable + 'static>(item: U) -> Self {
        Payload::Versioned(Arc::new(item))
    }

    pub fn upsertable(&self) -> Option<&Arc<dyn Upsertable>> {
        match self {
            Payload::Plain(_) => None,
            Payload::Identifiable(item) | Payload::Versioned(item) => Some(item),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Plain(_) => "plain",
            Payload::Identifiable(_) => "identifiable",
            Payload::Versioned(_) => "versioned",
        }
    }

    /// Project into a record of `entity`.
    pub fn to_record(&self, entity: &str) -> Record {
        match self {
            Payload::Plain(record) => {
                let mut record = record.clone();
                record.set_entity(entity);
                record
            }
            Payload::Identifiable(item) | Payload::Versioned(item) => item.to_record(entity),
        }
    }

    pub fn representation(&self) -> String {
        match self {
            Payload::Plain(record) => record.representation(),
            Payload::Identifiable(item) | Payload::Versioned(item) => item.representation(),
        }
    }
}

impl From<Record> for Payload {
    fn from(record: Record) -> Self {
        Payload::Plain(record)
    }
}

/// A ready-made [`Upsertable`] built from a primary key and loose fields.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRecord {
    key: String,
    value: Option<String>,
    fields: Fields,
    order: Option<Value>,
}

impl UpsertRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        let mut fields = Fields::new();
        fields.insert(key.clone(), Value::String(value.clone()));
        Self {
            key,
            value: Some(value),
            fields,
            order: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Sort batch items by this value before processing.
    pub fn with_order(mut self, value: impl Into<Value>) -> Self {
        self.order = Some(value.into());
        self
    }
}

impl Identifiable for UpsertRecord {
    fn primary_key(&self) -> &str {
        &self.key
    }

    fn primary_value(&self) -> Option<String> {
        self.value.clone()
    }
}

impl Upsertable for UpsertRecord {
    fn update_dictionary(&self) -> Fields {
        self.fields.clone()
    }

    fn ordering_value(&self) -> Option<Value> {
        self.order.clone()
    }
}
