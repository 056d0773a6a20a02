//! PostgreSQL introspector.

use super::helpers::{close_quietly, connect_error, quote_postgres_identifier};
use super::{Introspector, RowLimit};
use crate::config::{ConnectionConfig, ProbeSettings};
use crate::error::Result;
use crate::models::{ColumnInfo, DatabaseKind};
use crate::probe::ConnectTarget;
use crate::probe::driver::with_timeout;
use crate::probe::postgres::{TABLE_NAMES_QUERY, open};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgConnection;

/// Reads table metadata and previews rows from PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresIntrospector {
    settings: ProbeSettings,
}

impl PostgresIntrospector {
    /// Creates an introspector with the given timeouts.
    pub const fn new(settings: ProbeSettings) -> Self {
        Self { settings }
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<PgConnection> {
        let target = ConnectTarget::for_config(config);
        open(&target, &self.settings)
            .await
            .map_err(|e| connect_error(&target, e))
    }

    async fn table_names(&self, conn: &mut PgConnection, schema: &str) -> Result<Vec<String>> {
        with_timeout(
            self.settings.query_timeout,
            "Failed to list PostgreSQL tables",
            sqlx::query_scalar::<_, String>(TABLE_NAMES_QUERY)
                .bind(schema)
                .fetch_all(conn),
        )
        .await
    }

    async fn columns(
        &self,
        conn: &mut PgConnection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>> {
        let query = r"
            SELECT
                a.attname::text AS column_name,
                pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
                NOT a.attnotnull AS is_nullable,
                COALESCE(i.indisprimary, false) AS is_primary_key
            FROM pg_catalog.pg_attribute a
            JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            LEFT JOIN pg_catalog.pg_index i
                ON i.indrelid = c.oid AND i.indisprimary AND a.attnum = ANY(i.indkey)
            WHERE n.nspname = $1
            AND c.relname = $2
            AND c.relkind IN ('r', 'p')
            AND a.attnum > 0
            AND NOT a.attisdropped
            ORDER BY a.attnum
        ";

        let rows = with_timeout(
            self.settings.query_timeout,
            &format!("Failed to collect columns for table '{}.{}'", schema, table),
            sqlx::query(query).bind(schema).bind(table).fetch_all(conn),
        )
        .await?;

        Ok(rows
            .iter()
            .map(|row| ColumnInfo {
                name: row.try_get("column_name").unwrap_or_default(),
                data_type: row.try_get("data_type").unwrap_or_default(),
                nullable: row.try_get("is_nullable").unwrap_or(true),
                primary_key: row.try_get("is_primary_key").unwrap_or(false),
            })
            .collect())
    }

    async fn rows(
        &self,
        conn: &mut PgConnection,
        schema: &str,
        table: &str,
        limit: RowLimit,
    ) -> Result<Option<Vec<serde_json::Value>>> {
        let tables = self.table_names(&mut *conn, schema).await?;
        if !tables.iter().any(|name| name == table) {
            return Ok(None);
        }

        // row_to_json(t.*) returns every column as one JSON object
        let query = format!(
            "SELECT row_to_json(t.*) AS row_data FROM {}.{} t LIMIT $1",
            quote_postgres_identifier(schema),
            quote_postgres_identifier(table)
        );

        let rows: Vec<serde_json::Value> = with_timeout(
            self.settings.query_timeout,
            &format!("Failed to read rows from table '{}.{}'", schema, table),
            sqlx::query_scalar(&query)
                .bind(i64::from(limit.get()))
                .fetch_all(conn),
        )
        .await?;

        Ok(Some(rows))
    }
}

#[async_trait]
impl Introspector for PostgresIntrospector {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::PostgreSql
    }

    async fn list_tables(&self, config: &ConnectionConfig) -> Result<Vec<String>> {
        let schema = config.schema_name().unwrap_or("public");
        let mut conn = self.connect(config).await?;
        let result = self.table_names(&mut conn, schema).await;
        close_quietly(conn).await;
        result
    }

    async fn get_table_schema(&self, config: &ConnectionConfig) -> Result<Option<Vec<ColumnInfo>>> {
        let schema = config.schema_name().unwrap_or("public");
        let mut conn = self.connect(config).await?;
        let result = self.columns(&mut conn, schema, config.table.trim()).await;
        close_quietly(conn).await;
        result.map(|columns| (!columns.is_empty()).then_some(columns))
    }

    async fn get_table_rows(
        &self,
        config: &ConnectionConfig,
        limit: RowLimit,
    ) -> Result<Option<Vec<serde_json::Value>>> {
        let schema = config.schema_name().unwrap_or("public");
        let mut conn = self.connect(config).await?;
        let result = self
            .rows(&mut conn, schema, config.table.trim(), limit)
            .await;
        close_quietly(conn).await;
        tracing::debug!("Read preview rows from {}", config);
        result
    }
}
