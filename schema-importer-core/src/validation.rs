//! Structural validation of source connection configs.
//!
//! Field-presence rules per database kind, checked without any I/O. This
//! always runs before a probe so that an incomplete config never costs a
//! connection attempt.
//!
//! | kind       | required fields (in check order) |
//! |------------|----------------------------------|
//! | mysql      | `table`                          |
//! | postgresql | `table`, `schema`                |

use crate::config::ConnectionConfig;
use crate::models::DatabaseKind;
use serde::Serialize;
use thiserror::Error;

/// Reasons a config is structurally invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    /// `table` is missing or blank
    #[error("Table name is required.")]
    TableRequired,
    /// `schema` is missing or blank on a kind that needs one
    #[error("Schema name is required.")]
    SchemaRequired,
}

impl ValidationError {
    /// Stable machine-readable code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::TableRequired => "table_required",
            Self::SchemaRequired => "schema_required",
        }
    }
}

/// Checks the field-presence rules for `config.kind`.
///
/// The table is checked before the schema, so a PostgreSQL config missing both
/// reports [`ValidationError::TableRequired`].
///
/// # Errors
/// Returns the first missing required field.
///
/// # Example
/// ```rust
/// use schema_importer_core::{ConnectionConfig, DatabaseKind, ValidationError, validate};
///
/// let config = ConnectionConfig::new(DatabaseKind::PostgreSql, "localhost").with_table("users");
/// assert_eq!(validate(&config), Err(ValidationError::SchemaRequired));
/// ```
pub fn validate(config: &ConnectionConfig) -> Result<(), ValidationError> {
    if config.table.trim().is_empty() {
        return Err(ValidationError::TableRequired);
    }

    match config.kind {
        DatabaseKind::MySql => Ok(()),
        DatabaseKind::PostgreSql => {
            if config.schema_name().is_none() {
                return Err(ValidationError::SchemaRequired);
            }
            Ok(())
        }
    }
}
