//! Shared data types: database kinds, server versions, and column metadata.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported source database families.
///
/// Adding a family means adding a variant here plus one probe driver and one
/// introspector; call sites dispatch on the kind and need no other change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatabaseKind {
    /// MySQL (and wire-compatible servers)
    #[serde(rename = "mysql")]
    MySql,
    /// PostgreSQL
    #[serde(rename = "postgresql", alias = "postgres")]
    PostgreSql,
}

impl DatabaseKind {
    /// All known kinds, in a stable order.
    pub const ALL: [Self; 2] = [Self::MySql, Self::PostgreSql];

    /// Lowercase identifier used in configuration and serialized output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::PostgreSql => "postgresql",
        }
    }

    /// URL scheme used when building a connection string.
    pub const fn url_scheme(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::PostgreSql => "postgres",
        }
    }

    /// Default server port.
    pub const fn default_port(self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::PostgreSql => 5432,
        }
    }

    /// Whether connections of this kind must name a schema.
    pub const fn requires_schema(self) -> bool {
        matches!(self, Self::PostgreSql)
    }

    /// Whether the probe checks CREATE privileges for this kind.
    pub const fn checks_create_privileges(self) -> bool {
        matches!(self, Self::PostgreSql)
    }

    /// Version support policy.
    ///
    /// - mysql: exactly 5.5, or any major >= 8
    /// - postgresql: any major >= 10
    ///
    /// The comparison is on integer components; `(0, 0)`, the fallback for an
    /// unreadable version, is never supported.
    pub const fn supports_version(self, version: ServerVersion) -> bool {
        match self {
            Self::MySql => (version.major == 5 && version.minor == 5) || version.major >= 8,
            Self::PostgreSql => version.major >= 10,
        }
    }
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MySql => write!(f, "MySQL"),
            Self::PostgreSql => write!(f, "PostgreSQL"),
        }
    }
}

impl FromStr for DatabaseKind {
    type Err = crate::error::SchemaImporterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::MySql),
            "postgresql" | "postgres" => Ok(Self::PostgreSql),
            other => Err(crate::error::SchemaImporterError::configuration(format!(
                "unknown database kind '{}': expected 'mysql' or 'postgresql'",
                other
            ))),
        }
    }
}

/// Server version reduced to its `(major, minor)` components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerVersion {
    /// Major version component
    pub major: u32,
    /// Minor version component
    pub minor: u32,
}

impl ServerVersion {
    /// Creates a version from its components.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parses the leading `major[.minor]` of a server version string.
    ///
    /// Accepts the forms servers actually report, such as `8.0.36`,
    /// `5.5.62-log`, `10.6.12-MariaDB`, `9.6.24` and
    /// `16.2 (Debian 16.2-1.pgdg120+2)`. A missing minor component reads as 0.
    /// Returns `None` when no leading major number is present.
    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw.split_whitespace().next()?;
        let mut parts = token.split('.');
        let major = leading_number(parts.next()?)?;
        let minor = parts.next().and_then(leading_number).unwrap_or(0);
        Some(Self { major, minor })
    }

    /// Parses a version string, falling back to `(0, 0)`.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or_default()
    }
}

fn leading_number(part: &str) -> Option<u32> {
    let end = part
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(part.len(), |(idx, _)| idx);
    part[..end].parse().ok()
}

impl std::fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Serialize for ServerVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Column metadata returned by table-schema introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Engine-native type name
    #[serde(rename = "type")]
    pub data_type: String,
    /// Whether the column accepts NULL
    pub nullable: bool,
    /// Whether the column is part of the primary key
    pub primary_key: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_serde_names() {
        assert_eq!(
            serde_json::to_string(&DatabaseKind::PostgreSql).unwrap(),
            "\"postgresql\""
        );
        let kind: DatabaseKind = serde_json::from_str("\"mysql\"").unwrap();
        assert_eq!(kind, DatabaseKind::MySql);
        assert!(serde_json::from_str::<DatabaseKind>("\"sqlite\"").is_err());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            "MySQL".parse::<DatabaseKind>().unwrap(),
            DatabaseKind::MySql
        );
        assert_eq!(
            "postgres".parse::<DatabaseKind>().unwrap(),
            DatabaseKind::PostgreSql
        );
        let err = "oracle".parse::<DatabaseKind>().unwrap_err();
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn test_parse_reported_versions() {
        assert_eq!(
            ServerVersion::parse("8.0.36"),
            Some(ServerVersion::new(8, 0))
        );
        assert_eq!(
            ServerVersion::parse("5.5.62-log"),
            Some(ServerVersion::new(5, 5))
        );
        assert_eq!(
            ServerVersion::parse("10.6.12-MariaDB-1:10.6.12+maria~ubu2004"),
            Some(ServerVersion::new(10, 6))
        );
        assert_eq!(
            ServerVersion::parse("9.6.24"),
            Some(ServerVersion::new(9, 6))
        );
        assert_eq!(
            ServerVersion::parse("16.2 (Debian 16.2-1.pgdg120+2)"),
            Some(ServerVersion::new(16, 2))
        );
        assert_eq!(
            ServerVersion::parse("17devel"),
            Some(ServerVersion::new(17, 0))
        );
        assert_eq!(
            ServerVersion::parse("5.50.1"),
            Some(ServerVersion::new(5, 50))
        );
    }

    #[test]
    fn test_parse_garbage_versions() {
        assert_eq!(ServerVersion::parse(""), None);
        assert_eq!(ServerVersion::parse("unknown"), None);
        assert_eq!(
            ServerVersion::parse_or_default(None),
            ServerVersion::new(0, 0)
        );
        assert_eq!(
            ServerVersion::parse_or_default(Some("v8")),
            ServerVersion::new(0, 0)
        );
    }

    #[test]
    fn test_mysql_version_policy() {
        let mysql = DatabaseKind::MySql;
        assert!(mysql.supports_version(ServerVersion::new(5, 5)));
        assert!(!mysql.supports_version(ServerVersion::new(5, 50)));
        assert!(!mysql.supports_version(ServerVersion::new(5, 6)));
        assert!(!mysql.supports_version(ServerVersion::new(5, 7)));
        assert!(!mysql.supports_version(ServerVersion::new(6, 0)));
        assert!(!mysql.supports_version(ServerVersion::new(7, 9)));
        assert!(mysql.supports_version(ServerVersion::new(8, 0)));
        assert!(mysql.supports_version(ServerVersion::new(8, 4)));
        assert!(mysql.supports_version(ServerVersion::new(9, 1)));
        assert!(!mysql.supports_version(ServerVersion::default()));
    }

    #[test]
    fn test_postgres_version_policy() {
        let pg = DatabaseKind::PostgreSql;
        assert!(!pg.supports_version(ServerVersion::new(9, 6)));
        assert!(pg.supports_version(ServerVersion::new(10, 0)));
        assert!(pg.supports_version(ServerVersion::new(12, 5)));
        assert!(!pg.supports_version(ServerVersion::default()));
    }

    #[test]
    fn test_version_serializes_as_string() {
        assert_eq!(
            serde_json::to_string(&ServerVersion::new(12, 5)).unwrap(),
            "\"12.5\""
        );
    }

    #[test]
    fn test_column_info_uses_type_key() {
        let column = ColumnInfo {
            name: "id".to_string(),
            data_type: "integer".to_string(),
            nullable: false,
            primary_key: true,
        };
        let json = serde_json::to_value(&column).unwrap();
        assert_eq!(json["type"], "integer");
        assert_eq!(json["primary_key"], true);
    }
}
