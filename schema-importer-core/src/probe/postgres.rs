//! PostgreSQL probe driver.
//!
//! Privilege questions use `has_schema_privilege` / `has_database_privilege`,
//! which the admin session can answer for any role.

use super::driver::{ConnectTarget, ProbeDriver, ProbeSession, connect_within, with_timeout};
use crate::config::ProbeSettings;
use crate::error::SchemaImporterError;
use crate::models::DatabaseKind;
use crate::probe::ProbeError;
use async_trait::async_trait;
use sqlx::Connection;
use sqlx::postgres::PgConnection;
use std::time::Duration;

/// Opens single PostgreSQL connections for probing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

#[async_trait]
impl ProbeDriver for PostgresDriver {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::PostgreSql
    }

    async fn connect(
        &self,
        target: &ConnectTarget,
        settings: &ProbeSettings,
    ) -> Result<Box<dyn ProbeSession>, ProbeError> {
        let conn = open(target, settings).await.map_err(|e| {
            let reason = classify_connect_error(&e);
            tracing::debug!(
                "PostgreSQL connection to {} failed ({}): {}",
                target.redacted_url(),
                reason.code(),
                e
            );
            reason
        })?;

        Ok(Box::new(PostgresSession {
            conn,
            query_timeout: settings.query_timeout,
        }))
    }
}

/// Opens one PostgreSQL connection within the configured connect timeout.
pub(crate) async fn open(
    target: &ConnectTarget,
    settings: &ProbeSettings,
) -> Result<PgConnection, sqlx::Error> {
    connect_within::<PgConnection>(settings.connect_timeout, target).await
}

/// Maps a failed connect to a probe failure reason.
pub(crate) fn classify_connect_error(error: &sqlx::Error) -> ProbeError {
    match error {
        sqlx::Error::Database(db) => db
            .code()
            .map_or(
                ProbeError::ConnectionFailed,
                |code| classify_sqlstate(&code),
            ),
        _ => ProbeError::ConnectionFailed,
    }
}

/// SQLSTATE classes seen during startup.
///
/// - `28P01` invalid_password, `28000` invalid_authorization_specification
/// - `3D000` invalid_catalog_name
pub(crate) fn classify_sqlstate(code: &str) -> ProbeError {
    match code {
        "28P01" | "28000" => ProbeError::InvalidCredentials,
        "3D000" => ProbeError::InvalidDatabase,
        _ => ProbeError::ConnectionFailed,
    }
}

/// Base tables of the bound schema, or of `current_schema()` when NULL.
pub(crate) const TABLE_NAMES_QUERY: &str = r"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = COALESCE($1::text, current_schema()::text)
    AND table_type = 'BASE TABLE'
    ORDER BY table_name
";

struct PostgresSession {
    conn: PgConnection,
    query_timeout: Duration,
}

#[async_trait]
impl ProbeSession for PostgresSession {
    async fn table_names(&mut self, schema: Option<&str>) -> crate::Result<Vec<String>> {
        with_timeout(
            self.query_timeout,
            "Failed to list PostgreSQL tables",
            sqlx::query_scalar::<_, String>(TABLE_NAMES_QUERY)
                .bind(schema)
                .fetch_all(&mut self.conn),
        )
        .await
    }

    async fn schema_names(&mut self) -> crate::Result<Vec<String>> {
        with_timeout(
            self.query_timeout,
            "Failed to list PostgreSQL schemas",
            sqlx::query_scalar::<_, String>(
                "SELECT nspname::text FROM pg_catalog.pg_namespace ORDER BY nspname",
            )
            .fetch_all(&mut self.conn),
        )
        .await
    }

    async fn server_version(&mut self) -> crate::Result<Option<String>> {
        with_timeout(
            self.query_timeout,
            "Failed to read PostgreSQL version",
            sqlx::query_scalar::<_, String>("SELECT current_setting('server_version')")
                .fetch_optional(&mut self.conn),
        )
        .await
    }

    async fn has_schema_create_privilege(
        &mut self,
        user: &str,
        schema: &str,
    ) -> crate::Result<bool> {
        with_timeout(
            self.query_timeout,
            "Failed to check PostgreSQL schema privilege",
            sqlx::query_scalar::<_, bool>(
                "SELECT pg_catalog.has_schema_privilege($1::name, $2::text, 'CREATE')",
            )
            .bind(user)
            .bind(schema)
            .fetch_one(&mut self.conn),
        )
        .await
    }

    async fn has_database_create_privilege(
        &mut self,
        user: &str,
        database: &str,
    ) -> crate::Result<bool> {
        with_timeout(
            self.query_timeout,
            "Failed to check PostgreSQL database privilege",
            sqlx::query_scalar::<_, bool>(
                "SELECT pg_catalog.has_database_privilege($1::name, $2::text, 'CREATE')",
            )
            .bind(user)
            .bind(database)
            .fetch_one(&mut self.conn),
        )
        .await
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::PostgreSql
    }

    async fn close(self: Box<Self>) -> crate::Result<()> {
        let Self { conn, .. } = *self;
        conn.close().await.map_err(|e| {
            SchemaImporterError::connection_failed("Failed to close PostgreSQL connection", e)
        })
    }
}
