//! Audit row encoding
//!
//! Turns one entity snapshot into the audit row(s) describing it:
//!
//! 1. Revision id and revision type come first.
//! 2. Owning to-one associations contribute their foreign-key columns. The
//!    referenced entity's identifier is used when the entity is in the
//!    identity map; otherwise the column is null.
//! 3. Scalar fields contribute the snapshot value, or null when absent.
//! 4. Single-table classes and joined roots append the discriminator.
//! 5. Joined non-root classes continue one level up, with the leaf's
//!    discriminator injected into the snapshot, until the root is reached.
//!
//! Columns selected in steps 2-4 follow the descriptor's column plan, which
//! is the same plan the memoized insert statement was built from.

use crate::descriptor::{ColumnSlot, DescriptorCache, EntityDescriptor};
use entaudit_core::{
    AuditError, AuditResult, ClassName, ColumnType, PersistenceContext, RevisionId, RevisionType,
    Snapshot, StorageSink, Value,
};
use tracing::debug;

/// One column of an audit row
#[derive(Debug, Clone, PartialEq)]
pub struct AuditCell {
    /// Column name
    pub column: String,
    /// Value written
    pub value: Value,
    /// Column type passed with the parameter
    pub column_type: ColumnType,
}

/// One row of an audit table
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRow {
    /// Class whose audit table receives the row
    pub class: ClassName,
    /// Audit table name
    pub table: String,
    /// Revision shared by the whole flush
    pub revision: RevisionId,
    /// Operation kind
    pub revision_type: RevisionType,
    /// Columns in insert order, revision columns first
    pub cells: Vec<AuditCell>,
}

impl AuditRow {
    /// Value of a column
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|c| c.column == column)
            .map(|c| &c.value)
    }

    /// Column names in insert order
    pub fn columns(&self) -> Vec<&str> {
        self.cells.iter().map(|c| c.column.as_str()).collect()
    }

    /// Statement parameters in insert order
    pub fn params(&self) -> Vec<Value> {
        self.cells.iter().map(|c| c.value.clone()).collect()
    }

    /// Parameter types in insert order
    pub fn types(&self) -> Vec<ColumnType> {
        self.cells.iter().map(|c| c.column_type.clone()).collect()
    }
}

/// Encodes snapshots into audit rows and writes them
pub struct RowEncoder<'a> {
    cache: &'a DescriptorCache,
}

impl<'a> RowEncoder<'a> {
    /// Create an encoder over a descriptor cache
    pub fn new(cache: &'a DescriptorCache) -> Self {
        RowEncoder { cache }
    }

    /// Encode a snapshot of `class` into its audit rows, leaf first
    ///
    /// Returns one row for classes outside joined hierarchies and one row
    /// per level, leaf to root, for joined hierarchies.
    ///
    /// # Errors
    ///
    /// Returns a mapping error if a descriptor cannot be built or a required
    /// association cannot be resolved.
    pub fn encode(
        &self,
        ctx: &dyn PersistenceContext,
        class: &ClassName,
        revision_type: RevisionType,
        mut snapshot: Snapshot,
        revision: RevisionId,
    ) -> AuditResult<Vec<AuditRow>> {
        let chain = self.cache.ancestry(class)?;
        let mut rows = Vec::with_capacity(chain.len());

        let mut injected = false;
        for descriptor in &chain {
            rows.push(self.encode_level(ctx, descriptor, revision_type, &snapshot, revision)?);

            // The most derived class's value wins over ancestors and over
            // whatever the snapshot already carried.
            if !injected && descriptor.is_joined() && !descriptor.is_root() {
                if let Some(d) = &descriptor.discriminator {
                    let value = d.value.clone().unwrap_or(Value::Null);
                    snapshot.insert(d.column.clone(), value);
                    injected = true;
                }
            }
        }

        Ok(rows)
    }

    fn encode_level(
        &self,
        ctx: &dyn PersistenceContext,
        descriptor: &EntityDescriptor,
        revision_type: RevisionType,
        snapshot: &Snapshot,
        revision: RevisionId,
    ) -> AuditResult<AuditRow> {
        let config = self.cache.config();
        let mut cells = Vec::with_capacity(descriptor.columns.len() + 2);
        cells.push(AuditCell {
            column: config.revision_field_name.clone(),
            value: revision.into(),
            column_type: config.revision_id_field_type.clone(),
        });
        cells.push(AuditCell {
            column: config.revision_type_field_name.clone(),
            value: Value::from(revision_type.as_str()),
            column_type: ColumnType::String,
        });

        for slot in &descriptor.columns {
            let cell = match slot {
                ColumnSlot::AssociationKey {
                    field,
                    target,
                    source_column,
                    target_column,
                } => AuditCell {
                    column: source_column.clone(),
                    value: self.association_key(
                        ctx,
                        descriptor,
                        field,
                        target,
                        target_column,
                        snapshot,
                    )?,
                    column_type: self.cache.column_type(target, target_column)?,
                },
                ColumnSlot::Scalar {
                    field,
                    column,
                    column_type,
                    ..
                } => AuditCell {
                    column: column.clone(),
                    value: snapshot.get(field).cloned().unwrap_or(Value::Null),
                    column_type: column_type.clone(),
                },
                ColumnSlot::Discriminator {
                    column,
                    column_type,
                } => AuditCell {
                    column: column.clone(),
                    value: discriminator_value(descriptor, snapshot),
                    column_type: column_type.clone(),
                },
            };
            cells.push(cell);
        }

        Ok(AuditRow {
            class: descriptor.class.clone(),
            table: config.audit_table_name(&descriptor.table),
            revision,
            revision_type,
            cells,
        })
    }

    fn association_key(
        &self,
        ctx: &dyn PersistenceContext,
        descriptor: &EntityDescriptor,
        field: &str,
        target: &ClassName,
        target_column: &str,
        snapshot: &Snapshot,
    ) -> AuditResult<Value> {
        let required = descriptor.is_identifier(field);
        let data = match snapshot.get(field) {
            None | Some(Value::Null) => {
                if required {
                    return Err(AuditError::UnresolvedAssociation {
                        class: descriptor.class.clone(),
                        field: field.to_string(),
                    });
                }
                return Ok(Value::Null);
            }
            Some(data) => data,
        };

        let entity = match data {
            Value::Entity(entity) => entity,
            raw => {
                // Already a key value (e.g. a stored identifier of a deleted
                // entity); only meaningful for single-column keys.
                let single = descriptor
                    .association(field)
                    .map(|a| a.join_columns.len() == 1)
                    .unwrap_or(false);
                if single {
                    return Ok(raw.clone());
                }
                if required {
                    return Err(AuditError::UnresolvedAssociation {
                        class: descriptor.class.clone(),
                        field: field.to_string(),
                    });
                }
                debug!(class = %descriptor.class, field, "Composite association key without entity, storing null");
                return Ok(Value::Null);
            }
        };

        if !ctx.is_in_identity_map(entity) {
            if required {
                return Err(AuditError::UnresolvedAssociation {
                    class: descriptor.class.clone(),
                    field: field.to_string(),
                });
            }
            debug!(class = %descriptor.class, field, target = %entity, "Association target not in identity map, storing null");
            return Ok(Value::Null);
        }

        let identifier = ctx.identifier(entity)?;
        let target_field = self.target_field_for_column(target, target_column)?;
        Ok(identifier.get(&target_field).cloned().unwrap_or(Value::Null))
    }

    fn target_field_for_column(&self, target: &ClassName, column: &str) -> AuditResult<String> {
        let descriptor = self.cache.describe(target)?;
        if let Some(field) = descriptor.field_for_column(column) {
            return Ok(field.name.clone());
        }
        for slot in &descriptor.columns {
            if let ColumnSlot::AssociationKey {
                field,
                source_column,
                ..
            } = slot
            {
                if source_column == column {
                    return Ok(field.clone());
                }
            }
        }
        Err(AuditError::mapping(
            target,
            format!("referenced column '{}' is not mapped", column),
        ))
    }

    /// Write rows through the sink, root level first
    ///
    /// Root-first order lets audit tables keep the same root -> leaf foreign
    /// keys as the entity tables.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; rows already issued are left to the
    /// caller's transaction to roll back.
    pub fn write(&self, sink: &mut dyn StorageSink, rows: &[AuditRow]) -> AuditResult<usize> {
        for row in rows.iter().rev() {
            let shape = self.cache.insert_shape(&row.class)?;
            debug_assert_eq!(
                shape.columns.iter().map(String::as_str).collect::<Vec<_>>(),
                row.columns(),
                "audit row does not match insert statement"
            );
            sink.execute_parameterized(&shape.sql, &row.params(), &row.types())?;
            debug!(table = %row.table, revision = %row.revision, kind = %row.revision_type, "Wrote audit row");
        }
        Ok(rows.len())
    }
}

fn discriminator_value(descriptor: &EntityDescriptor, snapshot: &Snapshot) -> Value {
    let Some(d) = &descriptor.discriminator else {
        return Value::Null;
    };
    if descriptor.is_single_table() {
        return d.value.clone().unwrap_or(Value::Null);
    }
    snapshot
        .get(&d.column)
        .cloned()
        .or_else(|| d.value.clone())
        .unwrap_or(Value::Null)
}
