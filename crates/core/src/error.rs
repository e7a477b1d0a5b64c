//! Error types for entaudit
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Every error aborts the flush being audited. Audit rows are written inside
//! the host's transaction, so the caller rolls back both the primary write
//! and whatever audit rows were already issued.

use crate::types::ClassName;
use thiserror::Error;

/// Result type alias for audit operations
pub type AuditResult<T> = std::result::Result<T, AuditError>;

/// Error types for the audit engine
#[derive(Debug, Error)]
pub enum AuditError {
    /// Mapping metadata is inconsistent or incomplete for a tracked class
    #[error("Mapping error for {class}: {reason}")]
    Mapping {
        /// Class whose metadata is invalid
        class: ClassName,
        /// What is missing or inconsistent
        reason: String,
    },

    /// An association target could not be resolved to an identifier
    ///
    /// Only raised where the target is required; optional associations are
    /// stored as null instead.
    #[error("Unresolved association {class}.{field}")]
    UnresolvedAssociation {
        /// Class owning the association
        class: ClassName,
        /// Association field
        field: String,
    },

    /// The storage sink rejected a statement
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the failure
        message: String,
        /// Underlying driver error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A lifecycle signal arrived in a state that cannot accept it
    #[error("Invalid pipeline state: {0}")]
    InvalidState(String),

    /// Configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (config file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuditError {
    /// Create a mapping error
    pub fn mapping(class: &ClassName, reason: impl Into<String>) -> Self {
        AuditError::Mapping {
            class: class.clone(),
            reason: reason.into(),
        }
    }

    /// Create a storage error without an underlying source
    pub fn storage(message: impl Into<String>) -> Self {
        AuditError::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error wrapping a driver error
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AuditError::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        AuditError::InvalidState(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        AuditError::Config(message.into())
    }

    /// Whether this error came from the storage sink
    pub fn is_storage(&self) -> bool {
        matches!(self, AuditError::Storage { .. })
    }

    /// Whether this error is a mapping problem
    ///
    /// A required association that cannot be resolved counts as one.
    pub fn is_mapping(&self) -> bool {
        matches!(
            self,
            AuditError::Mapping { .. } | AuditError::UnresolvedAssociation { .. }
        )
    }
}
