//! Core types for entaudit
//!
//! This module defines the foundational types used throughout the system:
//! - ClassName: Identity of an entity class
//! - EntityRef: Handle to one entity instance in the host's object graph
//! - Identifier: Ordered identifier components of an entity
//! - Snapshot: Field name -> value mapping captured at flush time
//! - ChangeSet: Field name -> (old, new) computed by the host for an update
//! - RevisionType: Operation kind stored with every audit row
//! - RevisionId / Revision: The per-flush revision record

use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Identity of an entity class (fully qualified name as the host knows it)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassName(String);

impl ClassName {
    /// Create a class name
    pub fn new(name: impl Into<String>) -> Self {
        ClassName(name.into())
    }

    /// Borrow the class name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassName {
    fn from(s: &str) -> Self {
        ClassName(s.to_string())
    }
}

impl From<String> for ClassName {
    fn from(s: String) -> Self {
        ClassName(s)
    }
}

/// Handle to a single entity instance in the host's object graph
///
/// The `handle` is the host's object identity (two handles are the same
/// entity iff they are equal), not the database identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Concrete class of the entity
    pub class: ClassName,
    /// Object identity within the host
    pub handle: u64,
}

impl EntityRef {
    /// Create an entity reference
    pub fn new(class: ClassName, handle: u64) -> Self {
        EntityRef { class, handle }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.handle)
    }
}

/// Identifier components of an entity, in identifier declaration order
///
/// Order matters: deduplication hashes concatenate components in this order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifier(Vec<(String, Value)>);

impl Identifier {
    /// Create an empty identifier
    pub fn new() -> Self {
        Identifier(Vec::new())
    }

    /// Identifier with a single component
    pub fn single(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Identifier(vec![(field.into(), value.into())])
    }

    /// Append a component (builder style)
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, value);
        self
    }

    /// Set a component, replacing an existing one of the same name in place
    pub fn push(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.0.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.0.push((field, value)),
        }
    }

    /// Get a component by field name
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Iterate components in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Mutable access to component values
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.0.iter_mut().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no components
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Field values of one entity captured at flush time
///
/// Keys are field names, except for discriminator values injected during
/// joined-inheritance encoding, which are keyed by the discriminator column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot(HashMap<String, Value>);

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Snapshot(HashMap::new())
    }

    /// Set a value (builder style)
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Set a value, returning the previous one
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Get a value by field name
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Check whether a field is present
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Overlay identifier components onto the snapshot
    ///
    /// Identifier components win over values already present.
    pub fn merge_identifier(&mut self, identifier: &Identifier) {
        for (field, value) in identifier.iter() {
            self.0.insert(field.to_string(), value.clone());
        }
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the snapshot holds no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over fields (unordered)
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Snapshot(iter.into_iter().collect())
    }
}

/// One entry of a changeset: the value before and after the update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before the flush
    pub old: Value,
    /// Value written by the flush
    pub new: Value,
}

/// Changes the host computed for an updated entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet(BTreeMap<String, FieldChange>);

impl ChangeSet {
    /// Create an empty changeset
    pub fn new() -> Self {
        ChangeSet(BTreeMap::new())
    }

    /// Record a change (builder style)
    pub fn with(
        mut self,
        field: impl Into<String>,
        old: impl Into<Value>,
        new: impl Into<Value>,
    ) -> Self {
        self.record(field, old, new);
        self
    }

    /// Record a change
    pub fn record(&mut self, field: impl Into<String>, old: impl Into<Value>, new: impl Into<Value>) {
        self.0.insert(
            field.into(),
            FieldChange {
                old: old.into(),
                new: new.into(),
            },
        );
    }

    /// Remove every field named in `ignored`
    pub fn without_fields<S: AsRef<str>>(mut self, ignored: &[S]) -> Self {
        for field in ignored {
            self.0.remove(field.as_ref());
        }
        self
    }

    /// Get the change recorded for a field
    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.get(field)
    }

    /// Names of changed fields, sorted
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of changed fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if nothing changed
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Operation kind recorded with each audit row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevisionType {
    /// Entity was inserted
    Insert,
    /// Entity was updated
    Update,
    /// Entity was deleted
    Delete,
}

impl RevisionType {
    /// Stored column value (`INS`, `UPD`, `DEL`)
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionType::Insert => "INS",
            RevisionType::Update => "UPD",
            RevisionType::Delete => "DEL",
        }
    }

    /// Parse a stored column value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INS" => Some(RevisionType::Insert),
            "UPD" => Some(RevisionType::Update),
            "DEL" => Some(RevisionType::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for RevisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a revision row, generated by the revision table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevisionId(pub i64);

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RevisionId> for Value {
    fn from(id: RevisionId) -> Self {
        Value::Int(id.0)
    }
}

/// The revision shared by all audit rows of one flush
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Generated identifier
    pub id: RevisionId,
    /// When the revision was created
    pub timestamp: DateTime<Utc>,
    /// Who performed the flush
    pub username: String,
}
