//! Collaborator traits
//!
//! The audit engine never talks to a concrete ORM. Everything it needs from
//! the host is expressed by the traits in this module:
//! - MetadataProvider: mapping metadata per class
//! - PersistenceContext: the unit of work (identity map, changesets)
//! - StorageSink: statement execution inside the host's transaction
//! - UsernameResolver: who is performing the flush

use crate::error::AuditResult;
use crate::metadata::{ClassMetadata, ColumnType};
use crate::types::{ChangeSet, ClassName, EntityRef, Identifier, Snapshot};
use crate::value::Value;

/// Source of mapping metadata
///
/// Thread safety: the descriptor cache is shared between flushes, so
/// implementations must be callable from any thread.
pub trait MetadataProvider: Send + Sync {
    /// Describe one class
    ///
    /// # Errors
    ///
    /// Returns a mapping error if the class is unknown to the host.
    fn class_metadata(&self, class: &ClassName) -> AuditResult<ClassMetadata>;
}

/// View of the host's unit of work during a flush
pub trait PersistenceContext {
    /// Entities scheduled for deletion in the current flush
    ///
    /// May contain the same entity more than once.
    fn scheduled_deletions(&self) -> Vec<EntityRef>;

    /// Field values the host last synchronized with the database
    ///
    /// After the primary write this reflects the values just persisted.
    fn original_field_values(&self, entity: &EntityRef) -> AuditResult<Snapshot>;

    /// Current in-memory value of a single field
    fn field_value(&self, entity: &EntityRef, field: &str) -> Option<Value>;

    /// Changeset the host computed for an entity in this flush
    fn change_set(&self, entity: &EntityRef) -> ChangeSet;

    /// Identifier of an entity
    ///
    /// Identifier components that are associations hold the target's raw
    /// identifier value, not the target entity.
    fn identifier(&self, entity: &EntityRef) -> AuditResult<Identifier>;

    /// Whether the entity is still managed by the unit of work
    fn is_managed(&self, entity: &EntityRef) -> bool;

    /// Whether the entity is registered in the identity map
    fn is_in_identity_map(&self, entity: &EntityRef) -> bool;

    /// Find an already loaded entity by identifier within a class hierarchy
    ///
    /// `class` is the root class of the hierarchy.
    fn resolve_in_memory(&self, identifier: &Identifier, class: &ClassName) -> Option<EntityRef>;

    /// Recompute the changeset of a single entity, refreshing its original
    /// field values
    fn recompute_change_set(&mut self, entity: &EntityRef) -> AuditResult<()>;
}

/// Statement execution inside the caller's active transaction
pub trait StorageSink {
    /// Insert one row and return the generated identifier
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend rejects the insert.
    fn insert(
        &mut self,
        table: &str,
        values: &[(String, Value)],
        types: &[ColumnType],
    ) -> AuditResult<i64>;

    /// Execute a parameterized statement and return the affected row count
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend rejects the statement.
    fn execute_parameterized(
        &mut self,
        sql: &str,
        params: &[Value],
        types: &[ColumnType],
    ) -> AuditResult<u64>;
}

/// Resolves the author recorded on each revision
pub trait UsernameResolver: Send + Sync {
    /// Name of the user performing the current flush
    fn current_username(&self) -> String;
}

impl<F> UsernameResolver for F
where
    F: Fn() -> String + Send + Sync,
{
    fn current_username(&self) -> String {
        self()
    }
}

/// Resolver that always returns the same name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedUsername(pub String);

impl FixedUsername {
    /// Create a fixed resolver
    pub fn new(name: impl Into<String>) -> Self {
        FixedUsername(name.into())
    }
}

impl UsernameResolver for FixedUsername {
    fn current_username(&self) -> String {
        self.0.clone()
    }
}
