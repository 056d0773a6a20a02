//! MySQL probe driver.

use super::driver::{ConnectTarget, ProbeDriver, ProbeSession, connect_within, with_timeout};
use crate::config::ProbeSettings;
use crate::models::DatabaseKind;
use crate::probe::ProbeError;
use async_trait::async_trait;
use sqlx::Connection;
use sqlx::mysql::{MySqlConnection, MySqlDatabaseError};
use std::time::Duration;

/// Opens single MySQL connections for probing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDriver;

#[async_trait]
impl ProbeDriver for MySqlDriver {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }

    async fn connect(
        &self,
        target: &ConnectTarget,
        settings: &ProbeSettings,
    ) -> Result<Box<dyn ProbeSession>, ProbeError> {
        let conn = open(target, settings).await.map_err(|e| {
            let reason = classify_connect_error(&e);
            tracing::debug!(
                "MySQL connection to {} failed ({}): {}",
                target.redacted_url(),
                reason.code(),
                e
            );
            reason
        })?;

        Ok(Box::new(MySqlSession {
            conn,
            query_timeout: settings.query_timeout,
        }))
    }
}

/// Opens one MySQL connection within the configured connect timeout.
pub(crate) async fn open(
    target: &ConnectTarget,
    settings: &ProbeSettings,
) -> Result<MySqlConnection, sqlx::Error> {
    connect_within::<MySqlConnection>(settings.connect_timeout, target).await
}

/// Maps a failed connect to a probe failure reason.
pub(crate) fn classify_connect_error(error: &sqlx::Error) -> ProbeError {
    match error {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .map_or(
                ProbeError::ConnectionFailed,
                |e| classify_error_number(e.number()),
            ),
        _ => ProbeError::ConnectionFailed,
    }
}

/// Server error numbers seen during the handshake.
///
/// - 1044 `ER_DBACCESS_DENIED_ERROR`, 1045 `ER_ACCESS_DENIED_ERROR`,
///   1698 `ER_ACCESS_DENIED_NO_PASSWORD_ERROR`: credentials
/// - 1049 `ER_BAD_DB_ERROR`: unknown database
pub(crate) const fn classify_error_number(number: u16) -> ProbeError {
    match number {
        1044 | 1045 | 1698 => ProbeError::InvalidCredentials,
        1049 => ProbeError::InvalidDatabase,
        _ => ProbeError::ConnectionFailed,
    }
}

/// Base tables of the bound schema, or of the connection's database when
/// the bound value is NULL. CAST keeps the column a string type on 8.0.
pub(crate) const TABLE_NAMES_QUERY: &str = r"
    SELECT CAST(TABLE_NAME AS CHAR) AS TABLE_NAME
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
    AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME
";

struct MySqlSession {
    conn: MySqlConnection,
    query_timeout: Duration,
}

#[async_trait]
impl ProbeSession for MySqlSession {
    async fn table_names(&mut self, schema: Option<&str>) -> crate::Result<Vec<String>> {
        with_timeout(
            self.query_timeout,
            "Failed to list MySQL tables",
            sqlx::query_scalar::<_, String>(TABLE_NAMES_QUERY)
                .bind(schema)
                .fetch_all(&mut self.conn),
        )
        .await
    }

    async fn server_version(&mut self) -> crate::Result<Option<String>> {
        with_timeout(
            self.query_timeout,
            "Failed to read MySQL version",
            sqlx::query_scalar::<_, String>("SELECT CAST(VERSION() AS CHAR)")
                .fetch_optional(&mut self.conn),
        )
        .await
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }

    async fn close(self: Box<Self>) -> crate::Result<()> {
        let Self { conn, .. } = *self;
        conn.close().await.map_err(|e| {
            crate::error::SchemaImporterError::connection_failed(
                "Failed to close MySQL connection",
                e,
            )
        })
    }
}
