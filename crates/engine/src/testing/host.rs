//! In-memory metadata registry and unit of work

use entaudit_core::{
    AuditError, AuditResult, ChangeSet, ClassMetadata, ClassName, EntityRef, Identifier,
    MetadataProvider, PersistenceContext, Snapshot, Value,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Metadata provider over explicitly registered classes
#[derive(Default)]
pub struct MetadataRegistry {
    classes: RwLock<HashMap<ClassName, ClassMetadata>>,
    lookups: AtomicUsize,
}

impl MetadataRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a class
    pub fn register(&self, meta: ClassMetadata) {
        self.classes.write().insert(meta.class.clone(), meta);
    }

    /// Number of `class_metadata` calls served so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    fn root_of(&self, class: &ClassName) -> Option<ClassName> {
        self.classes
            .read()
            .get(class)
            .map(|meta| meta.root_class.clone().unwrap_or_else(|| meta.class.clone()))
    }
}

impl MetadataProvider for MetadataRegistry {
    fn class_metadata(&self, class: &ClassName) -> AuditResult<ClassMetadata> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.classes
            .read()
            .get(class)
            .cloned()
            .ok_or_else(|| AuditError::mapping(class, "class is not mapped"))
    }
}

struct ManagedEntity {
    entity: EntityRef,
    identifier: Identifier,
    original: Snapshot,
    current: Snapshot,
    managed: bool,
    in_identity_map: bool,
}

/// Unit of work holding entities after their primary write
///
/// Mutations are applied as the host would see them once its statements
/// ran: original data already reflects the persisted values.
pub struct InMemoryUnitOfWork {
    registry: Arc<MetadataRegistry>,
    entities: HashMap<u64, ManagedEntity>,
    change_sets: HashMap<u64, ChangeSet>,
    deletions: Vec<EntityRef>,
    next_handle: u64,
}

impl InMemoryUnitOfWork {
    /// Create an empty unit of work
    pub fn new(registry: Arc<MetadataRegistry>) -> Self {
        InMemoryUnitOfWork {
            registry,
            entities: HashMap::new(),
            change_sets: HashMap::new(),
            deletions: Vec::new(),
            next_handle: 1,
        }
    }

    /// Register a newly inserted entity
    pub fn persist(
        &mut self,
        class: impl Into<ClassName>,
        identifier: Identifier,
        fields: Snapshot,
    ) -> EntityRef {
        let entity = EntityRef::new(class.into(), self.next_handle);
        self.next_handle += 1;
        self.entities.insert(
            entity.handle,
            ManagedEntity {
                entity: entity.clone(),
                identifier,
                original: fields.clone(),
                current: fields,
                managed: true,
                in_identity_map: true,
            },
        );
        entity
    }

    /// Change a persisted field and record it in the entity's changeset
    pub fn update(&mut self, entity: &EntityRef, field: &str, value: impl Into<Value>) {
        let value = value.into();
        if let Some(managed) = self.entities.get_mut(&entity.handle) {
            let old = managed.original.get(field).cloned().unwrap_or(Value::Null);
            managed.original.insert(field, value.clone());
            managed.current.insert(field, value.clone());
            self.change_sets
                .entry(entity.handle)
                .or_default()
                .record(field, old, value);
        }
    }

    /// Change only the in-memory value of a field (e.g. a bumped version)
    pub fn set_current(&mut self, entity: &EntityRef, field: &str, value: impl Into<Value>) {
        if let Some(managed) = self.entities.get_mut(&entity.handle) {
            managed.current.insert(field, value);
        }
    }

    /// Schedule a hard deletion; the entity is detached
    pub fn remove(&mut self, entity: &EntityRef) {
        if let Some(managed) = self.entities.get_mut(&entity.handle) {
            managed.managed = false;
        }
        self.deletions.push(entity.clone());
    }

    /// Schedule a soft deletion: the entity stays managed and `field` is
    /// set in memory, to be picked up by a changeset recomputation
    pub fn soft_remove(&mut self, entity: &EntityRef, field: &str, value: impl Into<Value>) {
        self.set_current(entity, field, value);
        self.deletions.push(entity.clone());
    }

    /// Remove an entity from the identity map
    pub fn evict(&mut self, entity: &EntityRef) {
        if let Some(managed) = self.entities.get_mut(&entity.handle) {
            managed.in_identity_map = false;
        }
    }

    /// Forget this flush's changesets and scheduled deletions
    pub fn end_flush(&mut self) {
        self.change_sets.clear();
        self.deletions.clear();
    }

    fn get(&self, entity: &EntityRef) -> AuditResult<&ManagedEntity> {
        self.entities
            .get(&entity.handle)
            .ok_or_else(|| AuditError::invalid_state(format!("unknown entity {}", entity)))
    }
}

impl PersistenceContext for InMemoryUnitOfWork {
    fn scheduled_deletions(&self) -> Vec<EntityRef> {
        self.deletions.clone()
    }

    fn original_field_values(&self, entity: &EntityRef) -> AuditResult<Snapshot> {
        Ok(self.get(entity)?.original.clone())
    }

    fn field_value(&self, entity: &EntityRef, field: &str) -> Option<Value> {
        self.entities
            .get(&entity.handle)
            .and_then(|m| m.current.get(field).cloned())
    }

    fn change_set(&self, entity: &EntityRef) -> ChangeSet {
        self.change_sets
            .get(&entity.handle)
            .cloned()
            .unwrap_or_default()
    }

    fn identifier(&self, entity: &EntityRef) -> AuditResult<Identifier> {
        Ok(self.get(entity)?.identifier.clone())
    }

    fn is_managed(&self, entity: &EntityRef) -> bool {
        self.entities
            .get(&entity.handle)
            .map(|m| m.managed)
            .unwrap_or(false)
    }

    fn is_in_identity_map(&self, entity: &EntityRef) -> bool {
        self.entities
            .get(&entity.handle)
            .map(|m| m.in_identity_map)
            .unwrap_or(false)
    }

    fn resolve_in_memory(&self, identifier: &Identifier, class: &ClassName) -> Option<EntityRef> {
        let values: Vec<&Value> = identifier.iter().map(|(_, v)| v).collect();
        self.entities
            .values()
            .filter(|m| m.in_identity_map)
            .filter(|m| self.registry.root_of(&m.entity.class).as_ref() == Some(class))
            .find(|m| m.identifier.iter().map(|(_, v)| v).collect::<Vec<_>>() == values)
            .map(|m| m.entity.clone())
    }

    fn recompute_change_set(&mut self, entity: &EntityRef) -> AuditResult<()> {
        let managed = self
            .entities
            .get_mut(&entity.handle)
            .ok_or_else(|| AuditError::invalid_state(format!("unknown entity {}", entity)))?;
        let mut changes = ChangeSet::new();
        for (field, value) in managed.current.iter() {
            let old = managed.original.get(field).cloned().unwrap_or(Value::Null);
            if &old != value {
                changes.record(field.clone(), old, value.clone());
            }
        }
        managed.original = managed.current.clone();
        self.change_sets.insert(entity.handle, changes);
        Ok(())
    }
}
