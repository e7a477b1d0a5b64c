//! Entity descriptors
//!
//! An `EntityDescriptor` is the validated, immutable form of the host's
//! `ClassMetadata`. Besides the structural facts (fields, associations,
//! inheritance, identifier) it carries the audit column plan: the ordered
//! list of columns this class writes into its own audit table. Both the
//! memoized insert statement and the row encoder walk that same plan, so the
//! SQL shape and the parameter list cannot drift apart.
//!
//! ## Column plan
//!
//! ```text
//! revision id, revision type      (prepended by the encoder/shape)
//! owning to-one association keys  (not inherited under joined inheritance)
//! scalar fields                   (not inherited under joined inheritance,
//!                                  identifier fields always; fields whose
//!                                  column is an association key are skipped)
//! discriminator                   (joined root or single-table only)
//! ```

pub mod cache;

pub use cache::DescriptorCache;

use entaudit_core::{
    AuditError, AuditResult, ClassMetadata, ClassName, ColumnType, InheritanceKind, JoinColumn,
    Value,
};
use std::collections::HashSet;

/// A scalar field of a class
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Column name
    pub column: String,
    /// Column type
    pub column_type: ColumnType,
    /// Declared on an ancestor class
    pub inherited: bool,
    /// Placeholder wrapper, e.g. `ST_GeomFromText(?)`
    pub sql_conversion: Option<String>,
}

/// An owning-side to-one association of a class
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationDescriptor {
    /// Field name
    pub field: String,
    /// Referenced class
    pub target: ClassName,
    /// Source -> target column pairs
    pub join_columns: Vec<JoinColumn>,
    /// Declared on an ancestor class
    pub inherited: bool,
}

/// Discriminator column and this class's value
#[derive(Debug, Clone, PartialEq)]
pub struct Discriminator {
    /// Column name
    pub column: String,
    /// Column type
    pub column_type: ColumnType,
    /// Value identifying this class
    pub value: Option<Value>,
}

/// One column of a class's audit table, after the revision columns
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSlot {
    /// Foreign-key column of an owning to-one association
    AssociationKey {
        /// Association field
        field: String,
        /// Referenced class
        target: ClassName,
        /// Column in this table
        source_column: String,
        /// Referenced column on the target
        target_column: String,
    },
    /// Scalar field column
    Scalar {
        /// Field name
        field: String,
        /// Column name
        column: String,
        /// Column type
        column_type: ColumnType,
        /// Placeholder wrapper
        sql_conversion: Option<String>,
    },
    /// Discriminator column
    Discriminator {
        /// Column name
        column: String,
        /// Column type
        column_type: ColumnType,
    },
}

impl ColumnSlot {
    /// Column name in the audit table
    pub fn column(&self) -> &str {
        match self {
            ColumnSlot::AssociationKey { source_column, .. } => source_column,
            ColumnSlot::Scalar { column, .. } => column,
            ColumnSlot::Discriminator { column, .. } => column,
        }
    }

    /// Parameter placeholder for this column
    pub fn placeholder(&self) -> &str {
        match self {
            ColumnSlot::Scalar {
                sql_conversion: Some(template),
                ..
            } => template,
            _ => "?",
        }
    }
}

/// Validated, immutable structural metadata of one entity class
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    /// Class identity
    pub class: ClassName,
    /// Entity table name
    pub table: String,
    /// Scalar fields, inherited ones included
    pub fields: Vec<FieldDescriptor>,
    /// Owning-side to-one associations, inherited ones included
    pub associations: Vec<AssociationDescriptor>,
    /// Inheritance strategy
    pub inheritance: InheritanceKind,
    /// Discriminator (single-table and joined hierarchies)
    pub discriminator: Option<Discriminator>,
    /// Identifier field names in declaration order
    pub identifier: Vec<String>,
    /// Optimistic-lock version field
    pub version_field: Option<String>,
    /// Root class of the hierarchy (the class itself outside hierarchies)
    pub root: ClassName,
    /// Next class up the joined hierarchy
    pub parent: Option<ClassName>,
    /// Audit columns after the revision columns, in order
    pub columns: Vec<ColumnSlot>,
}

impl EntityDescriptor {
    /// Validate host metadata and build the descriptor
    ///
    /// # Errors
    ///
    /// Returns a mapping error when the metadata lacks information the
    /// encoder depends on.
    pub fn from_metadata(meta: ClassMetadata) -> AuditResult<Self> {
        let class = meta.class.clone();
        if meta.table.trim().is_empty() {
            return Err(AuditError::mapping(&class, "table name is empty"));
        }
        if meta.identifier.is_empty() {
            return Err(AuditError::mapping(&class, "no identifier fields"));
        }
        for id in &meta.identifier {
            if meta.field_mapping(id).is_none() && meta.association_mapping(id).is_none() {
                return Err(AuditError::mapping(
                    &class,
                    format!("identifier '{}' is neither a field nor an association", id),
                ));
            }
        }
        if let Some(version) = &meta.version_field {
            if meta.field_mapping(version).is_none() {
                return Err(AuditError::mapping(
                    &class,
                    format!("version field '{}' is not a mapped field", version),
                ));
            }
        }

        let root = meta.root_class.clone().unwrap_or_else(|| class.clone());
        let is_root = root == class;

        let discriminator = match meta.inheritance {
            InheritanceKind::None => None,
            kind => {
                let column = meta.discriminator_column.clone().ok_or_else(|| {
                    AuditError::mapping(&class, "inheritance mapping without discriminator column")
                })?;
                let value_required = kind == InheritanceKind::SingleTable || !is_root;
                if value_required && meta.discriminator_value.is_none() {
                    return Err(AuditError::mapping(&class, "missing discriminator value"));
                }
                Some(Discriminator {
                    column: column.name,
                    column_type: column.column_type,
                    value: meta.discriminator_value.clone(),
                })
            }
        };

        let parent = match meta.inheritance {
            InheritanceKind::Joined if !is_root => {
                Some(meta.parent_class.clone().unwrap_or_else(|| root.clone()))
            }
            _ => None,
        };

        let mut associations = Vec::new();
        for assoc in &meta.associations {
            if !assoc.stores_columns() {
                continue;
            }
            if assoc.join_columns.is_empty() {
                return Err(AuditError::mapping(
                    &class,
                    format!("owning association '{}' has no join columns", assoc.field),
                ));
            }
            associations.push(AssociationDescriptor {
                field: assoc.field.clone(),
                target: assoc.target.clone(),
                join_columns: assoc.join_columns.clone(),
                inherited: assoc.inherited_from.is_some(),
            });
        }

        let fields = meta
            .fields
            .iter()
            .map(|f| FieldDescriptor {
                name: f.name.clone(),
                column: f.column.clone(),
                column_type: f.column_type.clone(),
                inherited: f.inherited_from.is_some(),
                sql_conversion: f.sql_conversion.clone(),
            })
            .collect();

        let mut descriptor = EntityDescriptor {
            class,
            table: meta.table,
            fields,
            associations,
            inheritance: meta.inheritance,
            discriminator,
            identifier: meta.identifier,
            version_field: meta.version_field,
            root,
            parent,
            columns: Vec::new(),
        };
        descriptor.columns = descriptor.plan_columns();
        Ok(descriptor)
    }

    fn plan_columns(&self) -> Vec<ColumnSlot> {
        let mut slots = Vec::new();
        let mut covered: HashSet<&str> = HashSet::new();

        for assoc in &self.associations {
            if self.is_joined() && assoc.inherited && !self.is_identifier(&assoc.field) {
                continue;
            }
            for jc in &assoc.join_columns {
                covered.insert(jc.source.as_str());
                slots.push(ColumnSlot::AssociationKey {
                    field: assoc.field.clone(),
                    target: assoc.target.clone(),
                    source_column: jc.source.clone(),
                    target_column: jc.target.clone(),
                });
            }
        }

        for field in &self.fields {
            if covered.contains(field.name.as_str()) || covered.contains(field.column.as_str()) {
                continue;
            }
            if self.is_joined() && field.inherited && !self.is_identifier(&field.name) {
                continue;
            }
            slots.push(ColumnSlot::Scalar {
                field: field.name.clone(),
                column: field.column.clone(),
                column_type: field.column_type.clone(),
                sql_conversion: field.sql_conversion.clone(),
            });
        }

        if self.writes_discriminator() {
            if let Some(d) = &self.discriminator {
                slots.push(ColumnSlot::Discriminator {
                    column: d.column.clone(),
                    column_type: d.column_type.clone(),
                });
            }
        }

        slots
    }

    /// Whether this class is the root of its hierarchy
    pub fn is_root(&self) -> bool {
        self.root == self.class
    }

    /// Whether the class uses joined-table inheritance
    pub fn is_joined(&self) -> bool {
        self.inheritance == InheritanceKind::Joined
    }

    /// Whether the class uses single-table inheritance
    pub fn is_single_table(&self) -> bool {
        self.inheritance == InheritanceKind::SingleTable
    }

    /// Whether this class's audit row carries the discriminator column
    pub fn writes_discriminator(&self) -> bool {
        self.is_single_table() || (self.is_joined() && self.is_root())
    }

    /// Whether the field is part of the identifier
    pub fn is_identifier(&self, field: &str) -> bool {
        self.identifier.iter().any(|id| id == field)
    }

    /// Look up a scalar field by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up the scalar field stored in a column
    pub fn field_for_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Look up an owning to-one association by field name
    pub fn association(&self, field: &str) -> Option<&AssociationDescriptor> {
        self.associations.iter().find(|a| a.field == field)
    }

    /// The class whose audit row follows this one (joined non-root only)
    pub fn next_level(&self) -> Option<&ClassName> {
        self.parent.as_ref()
    }
}
