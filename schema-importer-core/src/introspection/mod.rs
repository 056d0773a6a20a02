//! Read-only introspection of a source connection's table.
//!
//! Each call opens one connection with the stored credentials, runs its
//! catalog or preview query, and closes the connection again.

#[cfg(any(feature = "mysql", feature = "postgresql"))]
mod helpers;
#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgresql")]
mod postgres;

#[cfg(any(feature = "mysql", feature = "postgresql"))]
pub use helpers::{quote_mysql_identifier, quote_postgres_identifier};
#[cfg(feature = "mysql")]
pub use mysql::MySqlIntrospector;
#[cfg(feature = "postgresql")]
pub use postgres::PostgresIntrospector;

use crate::config::{ConnectionConfig, ProbeSettings};
use crate::error::{Result, SchemaImporterError};
use crate::models::{ColumnInfo, DatabaseKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Number of rows a preview may return.
///
/// Always within `1..=100`; defaults to 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RowLimit(u32);

/// A requested row limit outside `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Row limit must be between 1 and {max}, got {requested}.")]
pub struct InvalidRowLimit {
    /// The rejected value
    pub requested: u32,
    /// Upper bound
    pub max: u32,
}

impl RowLimit {
    /// Largest accepted limit.
    pub const MAX: u32 = 100;
    /// Limit used when none is given.
    pub const DEFAULT: Self = Self(10);

    /// Checks `limit` against `1..=100`.
    ///
    /// # Errors
    /// Returns `InvalidRowLimit` for 0 or anything above 100.
    pub const fn new(limit: u32) -> std::result::Result<Self, InvalidRowLimit> {
        if limit == 0 || limit > Self::MAX {
            return Err(InvalidRowLimit {
                requested: limit,
                max: Self::MAX,
            });
        }
        Ok(Self(limit))
    }

    /// The limit as a number.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Default for RowLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for RowLimit {
    type Error = InvalidRowLimit;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RowLimit> for u32 {
    fn from(limit: RowLimit) -> Self {
        limit.0
    }
}

/// Catalog and preview queries against the table named in a config.
///
/// Methods returning `Option` give `None` when the configured table does not
/// exist in its database (mysql) or schema (postgresql).
#[async_trait]
pub trait Introspector: Send + Sync {
    /// Kind this introspector reads.
    fn kind(&self) -> DatabaseKind;

    /// Base table names in the config's database (mysql) or schema (postgresql).
    async fn list_tables(&self, config: &ConnectionConfig) -> Result<Vec<String>>;

    /// Columns of the configured table, in ordinal order.
    async fn get_table_schema(&self, config: &ConnectionConfig) -> Result<Option<Vec<ColumnInfo>>>;

    /// Up to `limit` rows of the configured table as JSON objects keyed by
    /// column name.
    async fn get_table_rows(
        &self,
        config: &ConnectionConfig,
        limit: RowLimit,
    ) -> Result<Option<Vec<serde_json::Value>>>;
}

/// Introspectors keyed by database kind.
#[derive(Clone, Default)]
pub struct Introspectors {
    by_kind: BTreeMap<DatabaseKind, Arc<dyn Introspector>>,
}

impl Introspectors {
    /// Every introspector compiled into this build.
    #[cfg_attr(
        not(any(feature = "mysql", feature = "postgresql")),
        allow(unused_variables)
    )]
    pub fn new(settings: ProbeSettings) -> Self {
        #[allow(unused_mut)]
        let mut introspectors = Self::default();
        #[cfg(feature = "mysql")]
        {
            introspectors = introspectors.with(Arc::new(MySqlIntrospector::new(settings)));
        }
        #[cfg(feature = "postgresql")]
        {
            introspectors = introspectors.with(Arc::new(PostgresIntrospector::new(settings)));
        }
        introspectors
    }

    /// Registers `introspector` for its kind, replacing any previous one.
    pub fn with(mut self, introspector: Arc<dyn Introspector>) -> Self {
        self.by_kind.insert(introspector.kind(), introspector);
        self
    }

    /// The introspector for `kind`.
    ///
    /// # Errors
    /// Returns an unsupported-feature error when none is registered.
    pub fn for_kind(&self, kind: DatabaseKind) -> Result<&dyn Introspector> {
        self.by_kind
            .get(&kind)
            .map(|introspector| &**introspector)
            .ok_or_else(|| SchemaImporterError::unsupported_feature("introspection", kind.as_str()))
    }
}

impl std::fmt::Debug for Introspectors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Introspectors")
            .field("kinds", &self.by_kind.keys().collect::<Vec<_>>())
            .finish()
    }
}
