//! Source connection configuration.
//!
//! `ConnectionConfig` is what a caller registers: engine kind, coordinates,
//! credentials, and the table (plus schema, for PostgreSQL) to import from.
//!
//! # Security
//! The password is write-only. It is accepted on deserialization, never
//! serialized, masked in `Debug`, and omitted from `Display`.

use crate::models::DatabaseKind;
use crate::security::{Credentials, Password};
use serde::{Deserialize, Serialize};

/// Configuration of one source connection.
///
/// Field names follow the public API; the legacy names `type`, `db`,
/// `table_name` and `schema_name` are accepted as aliases on input.
///
/// # Example
/// ```rust
/// use schema_importer_core::{ConnectionConfig, DatabaseKind};
///
/// let config = ConnectionConfig::new(DatabaseKind::PostgreSql, "db.internal")
///     .with_credentials("importer", "secret")
///     .with_database("sales")
///     .with_schema("public")
///     .with_table("orders");
///
/// assert_eq!(config.port, 5432);
/// assert!(!config.to_string().contains("secret"));
/// assert!(!serde_json::to_string(&config).unwrap().contains("secret"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database family
    #[serde(alias = "type")]
    pub kind: DatabaseKind,
    /// Server host name or address
    pub host: String,
    /// Server port
    pub port: u16,
    /// User whose access is being tested
    pub user: String,
    /// Password of `user`; write-only
    #[serde(skip_serializing)]
    pub password: Password,
    /// Database (catalog) to connect to
    #[serde(alias = "db")]
    pub database: String,
    /// Table to import from
    #[serde(default, alias = "table_name")]
    pub table: String,
    /// Schema containing `table` (PostgreSQL only)
    #[serde(
        default,
        alias = "schema_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema: Option<String>,
}

impl ConnectionConfig {
    /// Creates a config with the default port for `kind` and empty fields.
    pub fn new(kind: DatabaseKind, host: impl Into<String>) -> Self {
        Self {
            kind,
            host: host.into(),
            port: kind.default_port(),
            user: String::new(),
            password: Password::default(),
            database: String::new(),
            table: String::new(),
            schema: None,
        }
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder method to set user and password.
    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = user.into();
        self.password = Password::new(password);
        self
    }

    /// Builder method to set database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Builder method to set table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Builder method to set schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// The schema name, if one is set and non-blank.
    pub fn schema_name(&self) -> Option<&str> {
        self.schema
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The schema that scopes table lookups: the configured schema for
    /// PostgreSQL, nothing for MySQL (whose tables live in the database).
    pub fn table_scope(&self) -> Option<&str> {
        if self.kind.requires_schema() {
            self.schema_name()
        } else {
            None
        }
    }

    /// The tested user's credentials.
    pub fn credentials(&self) -> Credentials {
        Credentials::with_password(self.user.clone(), self.password.clone())
    }

    /// Returns a copy with every field present in `update` replaced.
    ///
    /// An empty `schema` in the update clears the schema.
    pub fn apply(&self, update: &ConnectionUpdate) -> Self {
        let mut next = self.clone();
        if let Some(host) = &update.host {
            next.host.clone_from(host);
        }
        if let Some(port) = update.port {
            next.port = port;
        }
        if let Some(user) = &update.user {
            next.user.clone_from(user);
        }
        if let Some(password) = &update.password {
            next.password = password.clone();
        }
        if let Some(database) = &update.database {
            next.database.clone_from(database);
        }
        if let Some(table) = &update.table {
            next.table.clone_from(table);
        }
        if let Some(schema) = &update.schema {
            next.schema = if schema.trim().is_empty() {
                None
            } else {
                Some(schema.clone())
            };
        }
        next
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{}:{}/{}",
            self.kind.as_str(),
            self.host,
            self.port,
            self.database
        )?;
        match self.schema_name() {
            Some(schema) => write!(f, " table={}.{}", schema, self.table),
            None => write!(f, " table={}", self.table),
        }
        // Intentionally omit user and never include credentials
    }
}

/// Partial update of a stored connection.
///
/// Every field is optional; absent fields keep their stored value. The
/// database kind cannot be changed, so unknown fields (including `kind`) are
/// rejected on input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionUpdate {
    /// New host
    pub host: Option<String>,
    /// New port
    pub port: Option<u16>,
    /// New user
    pub user: Option<String>,
    /// New password
    pub password: Option<Password>,
    /// New database
    #[serde(alias = "db")]
    pub database: Option<String>,
    /// New table
    #[serde(alias = "table_name")]
    pub table: Option<String>,
    /// New schema; empty clears it
    #[serde(alias = "schema_name")]
    pub schema: Option<String>,
}

impl ConnectionUpdate {
    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
