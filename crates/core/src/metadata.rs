//! Host mapping metadata
//!
//! `ClassMetadata` is what the host's metadata layer reports for one entity
//! class. It is deliberately permissive (optional discriminator, optional
//! root class, possibly empty join columns): the engine's descriptor cache
//! validates it once and turns it into an immutable descriptor.
//!
//! Inherited members carry `inherited_from`, the ancestor class declaring
//! them. A class lists all of its fields, inherited ones included, the same
//! way the host's own metadata does.

use crate::types::ClassName;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Column type passed along with every statement parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Integer column
    Integer,
    /// Short string column
    String,
    /// Long text column
    Text,
    /// Boolean column
    Boolean,
    /// Floating point column
    Float,
    /// Fixed-point decimal column
    Decimal,
    /// Date and time column
    DateTime,
    /// Date column
    Date,
    /// Binary column
    Binary,
    /// Host specific type, identified by name
    Custom(String),
}

/// A scalar field mapped to a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Field name on the entity
    pub name: String,
    /// Column name in the entity table
    pub column: String,
    /// Column type
    pub column_type: ColumnType,
    /// Ancestor class declaring this field, if inherited
    pub inherited_from: Option<ClassName>,
    /// SQL expression wrapping the placeholder, e.g. `ST_GeomFromText(?)`
    pub sql_conversion: Option<String>,
}

impl FieldMapping {
    /// Field stored in a column of the same name
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let name = name.into();
        FieldMapping {
            column: name.clone(),
            name,
            column_type,
            inherited_from: None,
            sql_conversion: None,
        }
    }

    /// Use a different column name
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Mark the field as declared on an ancestor class
    pub fn inherited_from(mut self, class: impl Into<ClassName>) -> Self {
        self.inherited_from = Some(class.into());
        self
    }

    /// Wrap the parameter placeholder in a SQL conversion expression
    pub fn sql_conversion(mut self, template: impl Into<String>) -> Self {
        self.sql_conversion = Some(template.into());
        self
    }
}

/// Association cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociationKind {
    /// One-to-one
    OneToOne,
    /// Many-to-one
    ManyToOne,
    /// One-to-many
    OneToMany,
    /// Many-to-many
    ManyToMany,
}

impl AssociationKind {
    /// Whether the association points at a single entity
    pub fn is_to_one(&self) -> bool {
        matches!(self, AssociationKind::OneToOne | AssociationKind::ManyToOne)
    }
}

/// Foreign-key column pair: source column in this table, target column in
/// the referenced table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumn {
    /// Column holding the foreign key
    pub source: String,
    /// Referenced column on the target class
    pub target: String,
}

impl JoinColumn {
    /// Create a join column pair
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        JoinColumn {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// An association field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationMapping {
    /// Field name on the entity
    pub field: String,
    /// Cardinality
    pub kind: AssociationKind,
    /// Whether this side holds the foreign-key columns
    pub owning_side: bool,
    /// Referenced class
    pub target: ClassName,
    /// Source -> target column pairs (owning side only)
    pub join_columns: Vec<JoinColumn>,
    /// Ancestor class declaring this association, if inherited
    pub inherited_from: Option<ClassName>,
}

impl AssociationMapping {
    /// Owning many-to-one association with a single join column
    pub fn many_to_one(
        field: impl Into<String>,
        target: impl Into<ClassName>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        AssociationMapping {
            field: field.into(),
            kind: AssociationKind::ManyToOne,
            owning_side: true,
            target: target.into(),
            join_columns: vec![JoinColumn::new(source_column, target_column)],
            inherited_from: None,
        }
    }

    /// Inverse one-to-many association (holds no columns)
    pub fn one_to_many(field: impl Into<String>, target: impl Into<ClassName>) -> Self {
        AssociationMapping {
            field: field.into(),
            kind: AssociationKind::OneToMany,
            owning_side: false,
            target: target.into(),
            join_columns: Vec::new(),
            inherited_from: None,
        }
    }

    /// Mark the association as declared on an ancestor class
    pub fn inherited_from(mut self, class: impl Into<ClassName>) -> Self {
        self.inherited_from = Some(class.into());
        self
    }

    /// Whether this association stores foreign-key columns in the class table
    pub fn stores_columns(&self) -> bool {
        self.owning_side && self.kind.is_to_one()
    }
}

/// Inheritance mapping strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InheritanceKind {
    /// No inheritance mapping
    None,
    /// All levels share one table, told apart by the discriminator
    SingleTable,
    /// Each level has its own table linked by the identifier
    Joined,
}

/// Discriminator column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscriminatorColumn {
    /// Column name
    pub name: String,
    /// Column type
    pub column_type: ColumnType,
}

/// Everything the host knows about one entity class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetadata {
    /// Class identity
    pub class: ClassName,
    /// Table name of the entity (the audit table name derives from it)
    pub table: String,
    /// Scalar fields, inherited ones included, in declaration order
    pub fields: Vec<FieldMapping>,
    /// Associations, inherited ones included
    pub associations: Vec<AssociationMapping>,
    /// Inheritance strategy
    pub inheritance: InheritanceKind,
    /// Discriminator column (single-table and joined hierarchies)
    pub discriminator_column: Option<DiscriminatorColumn>,
    /// Discriminator value identifying this class
    pub discriminator_value: Option<Value>,
    /// Identifier field names, in declaration order
    pub identifier: Vec<String>,
    /// Optimistic-lock version field
    pub version_field: Option<String>,
    /// Root class of the hierarchy (`None` means the class itself)
    pub root_class: Option<ClassName>,
    /// Direct parent class in the hierarchy
    pub parent_class: Option<ClassName>,
}

impl ClassMetadata {
    /// Class without inheritance, fields or associations
    pub fn new(class: impl Into<ClassName>, table: impl Into<String>) -> Self {
        ClassMetadata {
            class: class.into(),
            table: table.into(),
            fields: Vec::new(),
            associations: Vec::new(),
            inheritance: InheritanceKind::None,
            discriminator_column: None,
            discriminator_value: None,
            identifier: Vec::new(),
            version_field: None,
            root_class: None,
            parent_class: None,
        }
    }

    /// Add a scalar field
    pub fn field(mut self, mapping: FieldMapping) -> Self {
        self.fields.push(mapping);
        self
    }

    /// Add a scalar field that is (part of) the identifier
    pub fn id_field(mut self, mapping: FieldMapping) -> Self {
        self.identifier.push(mapping.name.clone());
        self.fields.push(mapping);
        self
    }

    /// Add an association
    pub fn association(mut self, mapping: AssociationMapping) -> Self {
        self.associations.push(mapping);
        self
    }

    /// Add an association that is (part of) the identifier
    pub fn id_association(mut self, mapping: AssociationMapping) -> Self {
        self.identifier.push(mapping.field.clone());
        self.associations.push(mapping);
        self
    }

    /// Declare an optimistic-lock version field (must also be a field)
    pub fn versioned(mut self, field: impl Into<String>) -> Self {
        self.version_field = Some(field.into());
        self
    }

    /// Place the class in an inheritance hierarchy
    pub fn inheritance(
        mut self,
        kind: InheritanceKind,
        root: Option<ClassName>,
        parent: Option<ClassName>,
    ) -> Self {
        self.inheritance = kind;
        self.root_class = root;
        self.parent_class = parent;
        self
    }

    /// Set the discriminator column and this class's value
    pub fn discriminator(
        mut self,
        column: impl Into<String>,
        column_type: ColumnType,
        value: impl Into<Value>,
    ) -> Self {
        self.discriminator_column = Some(DiscriminatorColumn {
            name: column.into(),
            column_type,
        });
        self.discriminator_value = Some(value.into());
        self
    }

    /// Look up a field by name
    pub fn field_mapping(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up an association by field name
    pub fn association_mapping(&self, field: &str) -> Option<&AssociationMapping> {
        self.associations.iter().find(|a| a.field == field)
    }
}
