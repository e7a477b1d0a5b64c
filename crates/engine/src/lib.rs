//! Audit engine for entaudit
//!
//! This crate turns a host's flush lifecycle into audit rows:
//! - AuditConfig: Table naming, revision columns, ignored fields
//! - DescriptorCache: Per-class descriptors and memoized insert statements
//! - RowEncoder: Snapshot to audit row(s), joined inheritance included
//! - RevisionAllocator: One revision row per flush, created lazily
//! - ChangeDeduplicator: Repeated deletions within a flush
//! - FlushPipeline: The flush state machine tying it all together
//! - AuditManager: Long-lived owner of config, cache and user source
//!
//! The engine never opens or commits transactions. Every audit statement is
//! issued through the host's `StorageSink` inside the host's transaction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dedup;
pub mod descriptor;
pub mod encoder;
pub mod manager;
pub mod pipeline;
pub mod revision;
pub mod testing;

pub use config::{AuditConfig, CONFIG_FILE_NAME};
pub use dedup::{entity_hash, ChangeDeduplicator};
pub use descriptor::cache::InsertShape;
pub use descriptor::{
    AssociationDescriptor, ColumnSlot, DescriptorCache, Discriminator, EntityDescriptor,
    FieldDescriptor,
};
pub use encoder::{AuditCell, AuditRow, RowEncoder};
pub use manager::AuditManager;
pub use pipeline::{
    DeletionHook, FlushPipeline, FlushReport, FlushState, PendingChanges, RecomputeIfManaged,
    SharedPipeline, SnapshotAsIs,
};
pub use revision::RevisionAllocator;
