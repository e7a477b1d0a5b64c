//! Core types and traits for entaudit
//!
//! This crate defines the foundational types used throughout the system:
//! - Value: Field value enum (scalars plus entity references)
//! - ClassName, EntityRef, Identifier: Entity addressing
//! - Snapshot, ChangeSet: Field data captured during a flush
//! - RevisionType, RevisionId, Revision: Revision records
//! - ClassMetadata: Host mapping metadata (fields, associations, inheritance)
//! - AuditError: Error type hierarchy
//! - Traits: Collaborator contracts (MetadataProvider, PersistenceContext,
//!   StorageSink, UsernameResolver)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod metadata;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{AuditError, AuditResult};
pub use metadata::{
    AssociationKind, AssociationMapping, ClassMetadata, ColumnType, DiscriminatorColumn,
    FieldMapping, InheritanceKind, JoinColumn,
};
pub use traits::{FixedUsername, MetadataProvider, PersistenceContext, StorageSink, UsernameResolver};
pub use types::{
    ChangeSet, ClassName, EntityRef, FieldChange, Identifier, Revision, RevisionId, RevisionType,
    Snapshot,
};
pub use value::Value;
