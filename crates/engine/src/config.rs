//! Audit configuration via `entaudit.toml`
//!
//! Names the audited classes, how audit and revision tables are named, and
//! which columns never count as a change. A default file can be written on
//! first start; edit it and restart to apply changes.

use entaudit_core::{AuditError, AuditResult, ClassName, ColumnType};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the application data directory.
pub const CONFIG_FILE_NAME: &str = "entaudit.toml";

/// Audit configuration loaded from `entaudit.toml`.
///
/// # Example
///
/// ```toml
/// audited_entities = ["App\\Order", "App\\Document"]
/// table_suffix = "_audit"
/// global_ignore_columns = ["updated_at"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Classes whose mutations are audited.
    #[serde(default)]
    pub audited_entities: Vec<String>,
    /// Prefix prepended to the entity table name.
    #[serde(default)]
    pub table_prefix: String,
    /// Suffix appended to the entity table name.
    #[serde(default = "default_table_suffix")]
    pub table_suffix: String,
    /// Table holding one row per revision.
    #[serde(default = "default_revision_table_name")]
    pub revision_table_name: String,
    /// Column referencing the revision in every audit table.
    #[serde(default = "default_revision_field_name")]
    pub revision_field_name: String,
    /// Column holding `INS`, `UPD` or `DEL`.
    #[serde(default = "default_revision_type_field_name")]
    pub revision_type_field_name: String,
    /// Column type of the revision id.
    #[serde(default = "default_revision_id_field_type")]
    pub revision_id_field_type: ColumnType,
    /// Fields whose change alone never produces an update row.
    #[serde(default)]
    pub global_ignore_columns: Vec<String>,
    /// Author recorded when no resolver is supplied.
    #[serde(default = "default_username")]
    pub default_username: String,
}

fn default_table_suffix() -> String {
    "_audit".to_string()
}

fn default_revision_table_name() -> String {
    "revisions".to_string()
}

fn default_revision_field_name() -> String {
    "revision_id".to_string()
}

fn default_revision_type_field_name() -> String {
    "revision_type".to_string()
}

fn default_revision_id_field_type() -> ColumnType {
    ColumnType::Integer
}

fn default_username() -> String {
    "system".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            audited_entities: Vec::new(),
            table_prefix: String::new(),
            table_suffix: default_table_suffix(),
            revision_table_name: default_revision_table_name(),
            revision_field_name: default_revision_field_name(),
            revision_type_field_name: default_revision_type_field_name(),
            revision_id_field_type: default_revision_id_field_type(),
            global_ignore_columns: Vec::new(),
            default_username: default_username(),
        }
    }
}

impl AuditConfig {
    /// Config auditing the given classes, defaults elsewhere.
    pub fn for_entities<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            audited_entities: entities.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Whether the class is listed as audited.
    pub fn is_audited(&self, class: &ClassName) -> bool {
        self.audited_entities.iter().any(|c| c == class.as_str())
    }

    /// Audit table name for an entity table.
    pub fn audit_table_name(&self, entity_table: &str) -> String {
        format!("{}{}{}", self.table_prefix, entity_table, self.table_suffix)
    }

    /// Check that names used in generated SQL are usable.
    ///
    /// # Errors
    ///
    /// Returns an error if a required name is empty, if the revision columns
    /// collide, or if the audit table name could equal the entity table name.
    pub fn validate(&self) -> AuditResult<()> {
        let required = [
            ("revision_table_name", &self.revision_table_name),
            ("revision_field_name", &self.revision_field_name),
            ("revision_type_field_name", &self.revision_type_field_name),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(AuditError::config(format!("'{}' must not be empty", key)));
            }
        }
        if self.revision_field_name == self.revision_type_field_name {
            return Err(AuditError::config(format!(
                "revision_field_name and revision_type_field_name are both '{}'",
                self.revision_field_name
            )));
        }
        if self.table_prefix.is_empty() && self.table_suffix.is_empty() {
            return Err(AuditError::config(
                "table_prefix and table_suffix are both empty; audit tables would overwrite entity tables",
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# entaudit configuration
#
# Classes whose inserts, updates and deletes are audited.
audited_entities = []

# Audit table name = table_prefix + entity table + table_suffix
table_prefix = ""
table_suffix = "_audit"

# Revision table and the revision columns present in every audit table.
revision_table_name = "revisions"
revision_field_name = "revision_id"
revision_type_field_name = "revision_type"
revision_id_field_type = "integer"

# Fields whose change alone does not produce an update row.
global_ignore_columns = []

# Author recorded on revisions when no username resolver is installed.
default_username = "system"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> AuditResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuditError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: AuditConfig = toml::from_str(&content).map_err(|e| {
            AuditError::config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> AuditResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> AuditResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AuditError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
