//! Descriptor cache
//!
//! Builds each class's `EntityDescriptor` and `InsertShape` once and keeps
//! them for the lifetime of the cache. Entries are never evicted; the number
//! of entries is bounded by the number of distinct classes the host maps.
//!
//! # Thread Safety
//!
//! The cache is shared between flushes. Lookups are lock-free reads on a
//! DashMap. A missing entry is built outside the map and published with the
//! entry API, so concurrent first lookups of the same class may both build,
//! but exactly one descriptor is ever visible for a class. Building outside
//! the shard lock matters because building an ancestry or shape looks up
//! other classes.

use super::{ColumnSlot, EntityDescriptor};
use crate::config::AuditConfig;
use dashmap::DashMap;
use entaudit_core::{AuditError, AuditResult, ClassName, ColumnType, MetadataProvider};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Memoized insert statement for one class's audit table
#[derive(Debug, Clone, PartialEq)]
pub struct InsertShape {
    /// Audit table name
    pub table: String,
    /// Column names, revision columns first
    pub columns: Vec<String>,
    /// Parameterized INSERT statement
    pub sql: String,
}

/// Per-class descriptor and insert-statement memoization
pub struct DescriptorCache {
    provider: Arc<dyn MetadataProvider>,
    config: Arc<AuditConfig>,
    descriptors: DashMap<ClassName, Arc<EntityDescriptor>>,
    shapes: DashMap<ClassName, Arc<InsertShape>>,
}

impl DescriptorCache {
    /// Create an empty cache over a metadata provider
    pub fn new(provider: Arc<dyn MetadataProvider>, config: Arc<AuditConfig>) -> Self {
        DescriptorCache {
            provider,
            config,
            descriptors: DashMap::new(),
            shapes: DashMap::new(),
        }
    }

    /// Configuration the cache derives table names from
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Whether mutations of the class are audited
    pub fn is_audited(&self, class: &ClassName) -> bool {
        self.config.is_audited(class)
    }

    /// Descriptor of a class, built on first use
    ///
    /// # Errors
    ///
    /// Returns a mapping error if the host metadata is missing or invalid.
    pub fn describe(&self, class: &ClassName) -> AuditResult<Arc<EntityDescriptor>> {
        if let Some(found) = self.descriptors.get(class) {
            return Ok(found.value().clone());
        }

        let meta = self.provider.class_metadata(class)?;
        if &meta.class != class {
            return Err(AuditError::mapping(
                class,
                format!("metadata provider returned metadata for {}", meta.class),
            ));
        }
        let built = Arc::new(EntityDescriptor::from_metadata(meta)?);
        debug!(class = %class, columns = built.columns.len(), "Built entity descriptor");

        let entry = self
            .descriptors
            .entry(class.clone())
            .or_insert_with(|| built);
        Ok(entry.value().clone())
    }

    /// Descriptors from `class` up to the root of a joined hierarchy
    ///
    /// Returns a single element for classes outside joined hierarchies.
    ///
    /// # Errors
    ///
    /// Returns a mapping error if an ancestor is unknown, is not part of the
    /// same joined hierarchy, or the parent chain loops.
    pub fn ancestry(&self, class: &ClassName) -> AuditResult<Vec<Arc<EntityDescriptor>>> {
        let leaf = self.describe(class)?;
        let mut seen: HashSet<ClassName> = HashSet::new();
        seen.insert(leaf.class.clone());

        let mut chain = vec![leaf];
        loop {
            let next = match chain.last().and_then(|d| d.next_level().cloned()) {
                Some(next) => next,
                None => break,
            };
            if !seen.insert(next.clone()) {
                return Err(AuditError::mapping(
                    class,
                    format!("inheritance chain loops at {}", next),
                ));
            }
            let ancestor = self.describe(&next)?;
            if !ancestor.is_joined() || ancestor.root != chain[0].root {
                return Err(AuditError::mapping(
                    class,
                    format!("{} is not part of the joined hierarchy rooted at {}", next, chain[0].root),
                ));
            }
            chain.push(ancestor);
        }
        Ok(chain)
    }

    /// Insert statement for a class's audit table, built on first use
    ///
    /// # Errors
    ///
    /// Returns a mapping error if the class cannot be described.
    pub fn insert_shape(&self, class: &ClassName) -> AuditResult<Arc<InsertShape>> {
        if let Some(found) = self.shapes.get(class) {
            return Ok(found.value().clone());
        }

        let descriptor = self.describe(class)?;
        let built = Arc::new(self.build_shape(&descriptor));
        debug!(class = %class, sql = %built.sql, "Built audit insert statement");

        let entry = self.shapes.entry(class.clone()).or_insert_with(|| built);
        Ok(entry.value().clone())
    }

    fn build_shape(&self, descriptor: &EntityDescriptor) -> InsertShape {
        let table = self.config.audit_table_name(&descriptor.table);

        let mut columns = vec![
            self.config.revision_field_name.clone(),
            self.config.revision_type_field_name.clone(),
        ];
        let mut placeholders = vec!["?", "?"];
        for slot in &descriptor.columns {
            columns.push(slot.column().to_string());
            placeholders.push(slot.placeholder());
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        InsertShape {
            table,
            columns,
            sql,
        }
    }

    /// Column type of a column on a class, resolving through its fields
    ///
    /// # Errors
    ///
    /// Returns a mapping error if the class has no field stored in `column`.
    pub fn column_type(&self, class: &ClassName, column: &str) -> AuditResult<ColumnType> {
        let mut seen: HashSet<(ClassName, String)> = HashSet::new();
        let mut current = (class.clone(), column.to_string());
        loop {
            if !seen.insert(current.clone()) {
                return Err(AuditError::mapping(
                    class,
                    format!(
                        "column '{}' references loop back at {}.{}",
                        column, current.0, current.1
                    ),
                ));
            }
            let descriptor = self.describe(&current.0)?;
            if let Some(field) = descriptor.field_for_column(&current.1) {
                return Ok(field.column_type.clone());
            }
            // A referenced column may itself be a foreign key of the target.
            let next = descriptor.columns.iter().find_map(|slot| match slot {
                ColumnSlot::AssociationKey {
                    source_column,
                    target,
                    target_column,
                    ..
                } if *source_column == current.1 => Some((target.clone(), target_column.clone())),
                _ => None,
            });
            match next {
                Some(next) => current = next,
                None => {
                    return Err(AuditError::mapping(
                        &current.0,
                        format!("no field is stored in column '{}'", current.1),
                    ))
                }
            }
        }
    }

    /// Describe every audited class up front
    ///
    /// # Errors
    ///
    /// Returns the first mapping error encountered.
    pub fn warm_up(&self) -> AuditResult<()> {
        for name in &self.config.audited_entities {
            let class = ClassName::new(name.as_str());
            self.ancestry(&class)?;
            self.insert_shape(&class)?;
        }
        Ok(())
    }

    /// Number of cached descriptors
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if no descriptor has been built yet
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl std::fmt::Debug for DescriptorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorCache")
            .field("descriptors", &self.descriptors.len())
            .field("shapes", &self.shapes.len())
            .finish()
    }
}
