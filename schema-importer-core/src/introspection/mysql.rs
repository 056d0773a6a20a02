//! MySQL introspector.

use super::helpers::{close_quietly, connect_error, mysql_row_to_json, quote_mysql_identifier};
use super::{Introspector, RowLimit};
use crate::config::{ConnectionConfig, ProbeSettings};
use crate::error::Result;
use crate::models::{ColumnInfo, DatabaseKind};
use crate::probe::ConnectTarget;
use crate::probe::driver::with_timeout;
use crate::probe::mysql::{TABLE_NAMES_QUERY, open};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::mysql::MySqlConnection;

/// Reads table metadata and previews rows from MySQL.
#[derive(Debug, Clone)]
pub struct MySqlIntrospector {
    settings: ProbeSettings,
}

impl MySqlIntrospector {
    /// Creates an introspector with the given timeouts.
    pub const fn new(settings: ProbeSettings) -> Self {
        Self { settings }
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<MySqlConnection> {
        let target = ConnectTarget::for_config(config);
        open(&target, &self.settings)
            .await
            .map_err(|e| connect_error(&target, e))
    }

    async fn table_names(&self, conn: &mut MySqlConnection) -> Result<Vec<String>> {
        with_timeout(
            self.settings.query_timeout,
            "Failed to list MySQL tables",
            sqlx::query_scalar::<_, String>(TABLE_NAMES_QUERY)
                .bind(None::<&str>)
                .fetch_all(conn),
        )
        .await
    }

    async fn columns(&self, conn: &mut MySqlConnection, table: &str) -> Result<Vec<ColumnInfo>> {
        // Use CAST to ensure string types for MySQL 8.0 compatibility
        let query = r"
            SELECT
                CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME,
                CAST(COLUMN_TYPE AS CHAR) AS COLUMN_TYPE,
                CAST(IS_NULLABLE AS CHAR) AS IS_NULLABLE,
                CAST(COLUMN_KEY AS CHAR) AS COLUMN_KEY
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        ";

        let rows = with_timeout(
            self.settings.query_timeout,
            &format!("Failed to collect columns for table '{}'", table),
            sqlx::query(query).bind(table).fetch_all(conn),
        )
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let is_nullable: String = row.try_get("IS_NULLABLE").unwrap_or_default();
                let column_key: String = row.try_get("COLUMN_KEY").unwrap_or_default();
                ColumnInfo {
                    name: row.try_get("COLUMN_NAME").unwrap_or_default(),
                    data_type: row.try_get("COLUMN_TYPE").unwrap_or_default(),
                    nullable: is_nullable.eq_ignore_ascii_case("YES"),
                    primary_key: column_key == "PRI",
                }
            })
            .collect())
    }

    async fn rows(
        &self,
        conn: &mut MySqlConnection,
        table: &str,
        limit: RowLimit,
    ) -> Result<Option<Vec<serde_json::Value>>> {
        let tables = self.table_names(&mut *conn).await?;
        if !tables.iter().any(|name| name == table) {
            return Ok(None);
        }

        let query = format!("SELECT * FROM {} LIMIT ?", quote_mysql_identifier(table));
        let rows = with_timeout(
            self.settings.query_timeout,
            &format!("Failed to read rows from table '{}'", table),
            sqlx::query(&query)
                .bind(i64::from(limit.get()))
                .fetch_all(conn),
        )
        .await?;

        Ok(Some(rows.iter().map(mysql_row_to_json).collect()))
    }
}

#[async_trait]
impl Introspector for MySqlIntrospector {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }

    async fn list_tables(&self, config: &ConnectionConfig) -> Result<Vec<String>> {
        let mut conn = self.connect(config).await?;
        let result = self.table_names(&mut conn).await;
        close_quietly(conn).await;
        result
    }

    async fn get_table_schema(&self, config: &ConnectionConfig) -> Result<Option<Vec<ColumnInfo>>> {
        let mut conn = self.connect(config).await?;
        let result = self.columns(&mut conn, config.table.trim()).await;
        close_quietly(conn).await;
        result.map(|columns| (!columns.is_empty()).then_some(columns))
    }

    async fn get_table_rows(
        &self,
        config: &ConnectionConfig,
        limit: RowLimit,
    ) -> Result<Option<Vec<serde_json::Value>>> {
        let mut conn = self.connect(config).await?;
        let result = self.rows(&mut conn, config.table.trim(), limit).await;
        close_quietly(conn).await;
        tracing::debug!("Read preview rows from {}", config);
        result
    }
}
