//! Revision allocation
//!
//! Exactly one revision row is written per flush, and only if the flush
//! produces at least one audit row. The allocator is flush-scoped: it is
//! reset at flush start and hands out the cached identifier to every audit
//! row written afterwards.

use crate::config::AuditConfig;
use chrono::Utc;
use entaudit_core::{
    AuditResult, ColumnType, Revision, RevisionId, StorageSink, UsernameResolver, Value,
};
use tracing::info;

/// Lazily creates the revision row of the current flush
#[derive(Debug, Default)]
pub struct RevisionAllocator {
    current: Option<Revision>,
}

impl RevisionAllocator {
    /// Create an allocator with no revision
    pub fn new() -> Self {
        RevisionAllocator { current: None }
    }

    /// Forget the revision of the previous flush
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// The revision allocated in this flush, if any
    pub fn current(&self) -> Option<&Revision> {
        self.current.as_ref()
    }

    /// Identifier of this flush's revision, writing the revision row on first
    /// call
    ///
    /// # Errors
    ///
    /// Returns a storage error if the revision row cannot be inserted; the
    /// allocator stays empty in that case.
    pub fn allocate(
        &mut self,
        sink: &mut dyn StorageSink,
        config: &AuditConfig,
        user: &dyn UsernameResolver,
    ) -> AuditResult<RevisionId> {
        if let Some(revision) = &self.current {
            return Ok(revision.id);
        }

        let timestamp = Utc::now();
        let username = user.current_username();
        let generated = sink.insert(
            &config.revision_table_name,
            &[
                ("timestamp".to_string(), Value::Timestamp(timestamp)),
                ("username".to_string(), Value::String(username.clone())),
            ],
            &[ColumnType::DateTime, ColumnType::String],
        )?;

        let revision = Revision {
            id: RevisionId(generated),
            timestamp,
            username,
        };
        info!(revision = %revision.id, username = %revision.username, "Allocated audit revision");
        let id = revision.id;
        self.current = Some(revision);
        Ok(id)
    }

    /// Take the allocated revision, leaving the allocator empty
    pub fn take(&mut self) -> Option<Revision> {
        self.current.take()
    }
}
