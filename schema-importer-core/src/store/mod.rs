//! Persistence of source connections.
//!
//! The probe and orchestrator never persist anything; the service stores a
//! config only after it has passed evaluation. Replacing a stored config is
//! conditional on the record's `updated_at`, so a config evaluated against
//! one version of a record never overwrites a newer one.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::models::DatabaseKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A persisted source connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConnection {
    /// Store-assigned identifier
    pub id: u64,
    /// The connection, including its password
    pub config: ConnectionConfig,
    /// When the connection was first saved
    pub created_at: DateTime<Utc>,
    /// When the connection was last changed
    pub updated_at: DateTime<Utc>,
}

impl StoredConnection {
    /// Public view without the password.
    pub fn to_public(&self) -> PublicConnection {
        PublicConnection {
            id: self.id,
            kind: self.config.kind,
            host: self.config.host.clone(),
            port: self.config.port,
            user: self.config.user.clone(),
            database: self.config.database.clone(),
            table: self.config.table.clone(),
            schema: self.config.schema_name().map(str::to_string),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// What callers outside the service get to see of a stored connection.
///
/// There is no password field under any name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicConnection {
    /// Identifier
    pub id: u64,
    /// Database family
    pub kind: DatabaseKind,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Tested user
    pub user: String,
    /// Database name
    pub database: String,
    /// Table name
    pub table: String,
    /// Schema name (postgresql)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Outcome of [`ConnectionStore::replace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// The new config was written
    Replaced(StoredConnection),
    /// No connection has the id
    Missing,
    /// The connection changed since it was read; nothing was written
    Stale,
}

/// Keyed store of source connections.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// The connection with `id`, if any.
    async fn get(&self, id: u64) -> Result<Option<StoredConnection>>;

    /// Stores `config` under a fresh id.
    async fn save(&self, config: ConnectionConfig) -> Result<StoredConnection>;

    /// Replaces the config of connection `id` if its `updated_at` still
    /// equals `expected`.
    async fn replace(
        &self,
        id: u64,
        expected: DateTime<Utc>,
        config: ConnectionConfig,
    ) -> Result<Replacement>;

    /// Removes the connection with `id`; false if absent.
    async fn delete(&self, id: u64) -> Result<bool>;

    /// Every stored connection, ordered by id.
    async fn list(&self) -> Result<Vec<StoredConnection>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_public_view_has_no_password() {
        let now = Utc::now();
        let stored = StoredConnection {
            id: 7,
            config: ConnectionConfig::new(DatabaseKind::PostgreSql, "db")
                .with_credentials("importer", "hunter2")
                .with_database("sales")
                .with_schema("public")
                .with_table("orders"),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(stored.to_public()).unwrap();
        let text = json.to_string();
        assert_eq!(json["id"], 7);
        assert_eq!(json["kind"], "postgresql");
        assert_eq!(json["schema"], "public");
        assert!(json.get("password").is_none());
        assert!(!text.contains("hunter2"));
    }
}
