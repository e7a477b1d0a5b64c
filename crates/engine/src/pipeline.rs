//! Flush pipeline
//!
//! Receives the host's write-lifecycle signals for one flush and writes the
//! audit trail at flush completion.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --on_flush--> Collecting --post_flush--> Encoding --> Idle
//!                      |   ^
//!                      +---+ post_persist / post_update
//! ```
//!
//! - `on_flush`: reset the revision, capture scheduled deletions (tracked
//!   classes only, deduplicated) together with their identifiers, which are
//!   gone after the primary delete.
//! - `post_persist` / `post_update`: queue tracked entities. The host reports
//!   each entity at most once per flush.
//! - `post_flush`: encode and write inserts, updates, then deletions. All
//!   rows share one revision.
//! - `abort`: drop everything queued.
//!
//! Audit rows are issued inside the host's transaction after the primary
//! statements. Any error returned here must make the host roll back; the
//! pipeline itself never commits or compensates.

use crate::dedup::ChangeDeduplicator;
use crate::descriptor::DescriptorCache;
use crate::encoder::RowEncoder;
use crate::revision::RevisionAllocator;
use entaudit_core::{
    AuditError, AuditResult, EntityRef, Identifier, PersistenceContext, Revision, RevisionType,
    Snapshot, StorageSink, UsernameResolver, Value,
};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prepares a deleted entity before its snapshot is taken
///
/// Soft-delete schemes keep the entity managed after the primary delete and
/// flip a marker instead; a hook can refresh the entity's original data so
/// the deletion row shows the marker.
pub trait DeletionHook: Send + Sync {
    /// Called once per audited deletion, before the snapshot is read
    fn before_snapshot(
        &self,
        ctx: &mut dyn PersistenceContext,
        entity: &EntityRef,
    ) -> AuditResult<()>;
}

/// Recomputes the changeset of deleted entities that are still managed
#[derive(Debug, Clone, Copy, Default)]
pub struct RecomputeIfManaged;

impl DeletionHook for RecomputeIfManaged {
    fn before_snapshot(
        &self,
        ctx: &mut dyn PersistenceContext,
        entity: &EntityRef,
    ) -> AuditResult<()> {
        if ctx.is_managed(entity) {
            debug!(entity = %entity, "Deleted entity still managed, recomputing changeset");
            ctx.recompute_change_set(entity)?;
        }
        Ok(())
    }
}

/// Leaves deleted entities untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotAsIs;

impl DeletionHook for SnapshotAsIs {
    fn before_snapshot(
        &self,
        _ctx: &mut dyn PersistenceContext,
        _entity: &EntityRef,
    ) -> AuditResult<()> {
        Ok(())
    }
}

/// Pipeline state within one flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    /// Between flushes
    Idle,
    /// Flush started, collecting mutations
    Collecting,
    /// Writing audit rows
    Encoding,
}

/// Counts of what is queued for the current flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingChanges {
    /// Queued inserts
    pub inserts: usize,
    /// Queued updates
    pub updates: usize,
    /// Queued deletions
    pub deletions: usize,
}

impl PendingChanges {
    /// Total queued entities
    pub fn total(&self) -> usize {
        self.inserts + self.updates + self.deletions
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Outcome of one flush
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlushReport {
    /// Revision shared by all rows, `None` if nothing was audited
    pub revision: Option<Revision>,
    /// Audit rows written, ancestor rows included
    pub rows_written: usize,
    /// Entities audited as inserted
    pub inserts: usize,
    /// Entities audited as updated
    pub updates: usize,
    /// Entities audited as deleted
    pub deletions: usize,
    /// Updates skipped because only ignored fields changed
    pub skipped_updates: usize,
}

/// Collects one flush's mutations and writes their audit rows
pub struct FlushPipeline {
    cache: Arc<DescriptorCache>,
    user: Arc<dyn UsernameResolver>,
    deletion_hook: Arc<dyn DeletionHook>,
    state: FlushState,
    allocator: RevisionAllocator,
    dedup: ChangeDeduplicator,
    deletions: Vec<(EntityRef, Identifier)>,
    inserts: Vec<EntityRef>,
    updates: Vec<EntityRef>,
}

impl FlushPipeline {
    /// Create an idle pipeline using the soft-delete aware deletion hook
    pub fn new(cache: Arc<DescriptorCache>, user: Arc<dyn UsernameResolver>) -> Self {
        FlushPipeline {
            cache,
            user,
            deletion_hook: Arc::new(RecomputeIfManaged),
            state: FlushState::Idle,
            allocator: RevisionAllocator::new(),
            dedup: ChangeDeduplicator::new(),
            deletions: Vec::new(),
            inserts: Vec::new(),
            updates: Vec::new(),
        }
    }

    /// Replace the deletion hook
    pub fn with_deletion_hook(mut self, hook: Arc<dyn DeletionHook>) -> Self {
        self.deletion_hook = hook;
        self
    }

    /// Current state
    pub fn state(&self) -> FlushState {
        self.state
    }

    /// What is queued for the current flush
    pub fn pending(&self) -> PendingChanges {
        PendingChanges {
            inserts: self.inserts.len(),
            updates: self.updates.len(),
            deletions: self.deletions.len(),
        }
    }

    /// Flush started: capture scheduled deletions
    ///
    /// A flush start while still collecting means the previous flush never
    /// completed; its queued state is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if an identifier cannot be read, or if called while
    /// encoding.
    pub fn on_flush(&mut self, ctx: &dyn PersistenceContext) -> AuditResult<()> {
        match self.state {
            FlushState::Idle => {}
            FlushState::Collecting => {
                warn!(
                    pending = self.pending().total(),
                    "Flush started before the previous one completed, discarding its audit state"
                );
                self.discard();
            }
            FlushState::Encoding => {
                return Err(AuditError::invalid_state("flush started while encoding"));
            }
        }

        self.allocator.reset();
        self.state = FlushState::Collecting;

        for entity in ctx.scheduled_deletions() {
            if !self.cache.is_audited(&entity.class) {
                continue;
            }
            let identifier = match ctx.identifier(&entity) {
                Ok(identifier) => identifier,
                Err(e) => {
                    self.discard();
                    return Err(e);
                }
            };
            if !self.dedup.first_sighting(&entity.class, &identifier) {
                debug!(entity = %entity, "Skipping repeated deletion");
                continue;
            }
            self.deletions.push((entity, identifier));
        }
        Ok(())
    }

    /// An entity insert was written
    ///
    /// # Errors
    ///
    /// Returns an error if no flush is in progress.
    pub fn post_persist(&mut self, entity: &EntityRef) -> AuditResult<()> {
        self.expect_collecting("post_persist")?;
        if self.cache.is_audited(&entity.class) {
            self.inserts.push(entity.clone());
        }
        Ok(())
    }

    /// An entity update was written
    ///
    /// # Errors
    ///
    /// Returns an error if no flush is in progress.
    pub fn post_update(&mut self, entity: &EntityRef) -> AuditResult<()> {
        self.expect_collecting("post_update")?;
        if self.cache.is_audited(&entity.class) {
            self.updates.push(entity.clone());
        }
        Ok(())
    }

    /// Flush completed: write the audit trail
    ///
    /// The pipeline is idle afterwards whether or not this succeeds.
    ///
    /// # Errors
    ///
    /// Returns the first mapping or storage error. The host must roll back
    /// its transaction.
    pub fn post_flush(
        &mut self,
        ctx: &mut dyn PersistenceContext,
        sink: &mut dyn StorageSink,
    ) -> AuditResult<FlushReport> {
        self.expect_collecting("post_flush")?;
        self.state = FlushState::Encoding;

        let result = self.encode_all(ctx, sink);
        let revision = self.allocator.take();
        self.discard();

        let mut report = result?;
        report.revision = revision;
        if let Some(revision) = &report.revision {
            info!(
                revision = %revision.id,
                rows = report.rows_written,
                inserts = report.inserts,
                updates = report.updates,
                deletions = report.deletions,
                skipped_updates = report.skipped_updates,
                "Audited flush"
            );
        }
        Ok(report)
    }

    /// Drop all queued state (the host aborted the flush)
    pub fn abort(&mut self) {
        if self.state != FlushState::Idle {
            debug!(pending = self.pending().total(), "Flush aborted, discarding audit state");
        }
        self.allocator.reset();
        self.discard();
    }

    fn discard(&mut self) {
        self.inserts.clear();
        self.updates.clear();
        self.deletions.clear();
        self.dedup.clear();
        self.state = FlushState::Idle;
    }

    fn expect_collecting(&self, signal: &str) -> AuditResult<()> {
        if self.state == FlushState::Collecting {
            Ok(())
        } else {
            Err(AuditError::invalid_state(format!(
                "{} received while {:?}",
                signal, self.state
            )))
        }
    }

    fn encode_all(
        &mut self,
        ctx: &mut dyn PersistenceContext,
        sink: &mut dyn StorageSink,
    ) -> AuditResult<FlushReport> {
        let inserts = std::mem::take(&mut self.inserts);
        let updates = std::mem::take(&mut self.updates);
        let deletions = std::mem::take(&mut self.deletions);
        let mut report = FlushReport::default();

        for entity in &inserts {
            let snapshot = self.entity_snapshot(&*ctx, entity)?;
            report.rows_written +=
                self.audit(&*ctx, sink, entity, RevisionType::Insert, snapshot)?;
            report.inserts += 1;
        }

        for entity in &updates {
            let changes = ctx
                .change_set(entity)
                .without_fields(&self.cache.config().global_ignore_columns);
            if changes.is_empty() {
                debug!(entity = %entity, "Only ignored fields changed, skipping");
                report.skipped_updates += 1;
                continue;
            }

            let identifier = self.resolve_identifier(&*ctx, entity)?;
            let mut snapshot = self.entity_snapshot(&*ctx, entity)?;
            snapshot.merge_identifier(&identifier);
            report.rows_written +=
                self.audit(&*ctx, sink, entity, RevisionType::Update, snapshot)?;
            report.updates += 1;
        }

        for (entity, identifier) in &deletions {
            self.deletion_hook.before_snapshot(ctx, entity)?;
            let mut snapshot = self.entity_snapshot(&*ctx, entity)?;
            snapshot.merge_identifier(identifier);
            report.rows_written +=
                self.audit(&*ctx, sink, entity, RevisionType::Delete, snapshot)?;
            report.deletions += 1;
        }

        Ok(report)
    }

    fn audit(
        &mut self,
        ctx: &dyn PersistenceContext,
        sink: &mut dyn StorageSink,
        entity: &EntityRef,
        revision_type: RevisionType,
        snapshot: Snapshot,
    ) -> AuditResult<usize> {
        let revision = self
            .allocator
            .allocate(sink, self.cache.config(), self.user.as_ref())?;
        let encoder = RowEncoder::new(&self.cache);
        let rows = encoder.encode(ctx, &entity.class, revision_type, snapshot, revision)?;
        encoder.write(sink, &rows)
    }

    /// Original field values plus the current version, if versioned
    fn entity_snapshot(
        &self,
        ctx: &dyn PersistenceContext,
        entity: &EntityRef,
    ) -> AuditResult<Snapshot> {
        let descriptor = self.cache.describe(&entity.class)?;
        let mut snapshot = ctx.original_field_values(entity)?;
        if let Some(version_field) = &descriptor.version_field {
            let current = ctx.field_value(entity, version_field).unwrap_or(Value::Null);
            snapshot.insert(version_field.clone(), current);
        }
        Ok(snapshot)
    }

    /// Identifier with association components replaced by the in-memory
    /// target entity
    fn resolve_identifier(
        &self,
        ctx: &dyn PersistenceContext,
        entity: &EntityRef,
    ) -> AuditResult<Identifier> {
        let descriptor = self.cache.describe(&entity.class)?;
        let mut identifier = ctx.identifier(entity)?;

        for (field, value) in identifier.iter_mut() {
            let Some(assoc) = descriptor.association(field) else {
                continue;
            };
            if matches!(value, Value::Entity(_)) {
                continue;
            }
            let target = self.cache.describe(&assoc.target)?;
            let target_id = match target.identifier.as_slice() {
                [single] => Identifier::single(single.clone(), value.clone()),
                _ => {
                    return Err(AuditError::mapping(
                        &descriptor.class,
                        format!(
                            "identifier association '{}' targets composite identifier of {}",
                            field, target.class
                        ),
                    ))
                }
            };
            match ctx.resolve_in_memory(&target_id, &target.root) {
                Some(resolved) => *value = Value::Entity(resolved),
                None => {
                    return Err(AuditError::UnresolvedAssociation {
                        class: descriptor.class.clone(),
                        field: field.to_string(),
                    })
                }
            }
        }
        Ok(identifier)
    }
}

impl std::fmt::Debug for FlushPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushPipeline")
            .field("state", &self.state)
            .field("pending", &self.pending())
            .finish()
    }
}

/// A pipeline shared between threads
///
/// Hold the guard from `on_flush` through `post_flush` so flushes do not
/// interleave their per-flush state.
#[derive(Clone)]
pub struct SharedPipeline {
    inner: Arc<Mutex<FlushPipeline>>,
}

impl SharedPipeline {
    /// Wrap a pipeline
    pub fn new(pipeline: FlushPipeline) -> Self {
        SharedPipeline {
            inner: Arc::new(Mutex::new(pipeline)),
        }
    }

    /// Exclusive access for one whole flush
    pub fn lock(&self) -> MutexGuard<'_, FlushPipeline> {
        self.inner.lock()
    }
}
