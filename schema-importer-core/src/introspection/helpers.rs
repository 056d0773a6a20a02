//! Helper utilities shared by the introspectors.

use crate::error::SchemaImporterError;
use crate::probe::ConnectTarget;
#[cfg(feature = "mysql")]
use serde_json::Value as JsonValue;

/// Quotes a MySQL identifier with backticks, doubling embedded backticks.
///
/// # Example
/// ```rust
/// use schema_importer_core::introspection::quote_mysql_identifier;
///
/// assert_eq!(quote_mysql_identifier("orders"), "`orders`");
/// assert_eq!(quote_mysql_identifier("we`ird"), "`we``ird`");
/// ```
pub fn quote_mysql_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// Quotes a PostgreSQL identifier with double quotes, doubling embedded quotes.
///
/// # Example
/// ```rust
/// use schema_importer_core::introspection::quote_postgres_identifier;
///
/// assert_eq!(quote_postgres_identifier("Orders"), "\"Orders\"");
/// assert_eq!(quote_postgres_identifier("a\"b"), "\"a\"\"b\"");
/// ```
pub fn quote_postgres_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Sanitized connect error for an introspection call.
pub(super) fn connect_error(target: &ConnectTarget, error: sqlx::Error) -> SchemaImporterError {
    SchemaImporterError::connection_failed(
        format!("Failed to connect to {}", target.redacted_url()),
        error,
    )
}

/// Closes `conn`, logging instead of failing; the result of the work done on
/// it is what the caller reports.
pub(super) async fn close_quietly<C>(conn: C)
where
    C: sqlx::Connection,
{
    if let Err(e) = conn.close().await {
        tracing::warn!("Failed to close introspection connection cleanly: {}", e);
    }
}

/// Convert a MySQL row to a JSON object keyed by column name.
#[cfg(feature = "mysql")]
pub(super) fn mysql_row_to_json(row: &sqlx::mysql::MySqlRow) -> JsonValue {
    use sqlx::{Column, Row};

    let map = row
        .columns()
        .iter()
        .map(|column| {
            let name = column.name();
            (name.to_string(), extract_mysql_value(row, name))
        })
        .collect();
    JsonValue::Object(map)
}

/// Extract a column value as a JSON value.
///
/// Tries the decodable types in order of likelihood; anything else (and SQL
/// NULL) becomes `null`.
#[cfg(feature = "mysql")]
fn extract_mysql_value(row: &sqlx::mysql::MySqlRow, column_name: &str) -> JsonValue {
    use sqlx::Row;

    if let Ok(v) = row.try_get::<Option<String>, _>(column_name) {
        return v.map_or(JsonValue::Null, JsonValue::String);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(column_name) {
        return v.map_or(JsonValue::Null, |n| JsonValue::Number(n.into()));
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(column_name) {
        return v.map_or(JsonValue::Null, |n| JsonValue::Number(n.into()));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(column_name) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map_or(JsonValue::Null, JsonValue::Number);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(column_name) {
        return v.map_or(JsonValue::Null, JsonValue::Bool);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(column_name) {
        return v.map_or(JsonValue::Null, |t| JsonValue::String(t.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(column_name) {
        return v.map_or(JsonValue::Null, |t| JsonValue::String(t.to_rfc3339()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(column_name) {
        return v.map_or(JsonValue::Null, |d| JsonValue::String(d.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(column_name) {
        return v.map_or(JsonValue::Null, |t| JsonValue::String(t.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(column_name) {
        return v.unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(column_name) {
        return v.map_or(JsonValue::Null, |bytes| {
            JsonValue::String(String::from_utf8_lossy(&bytes).into_owned())
        });
    }

    tracing::trace!(
        "Column '{}' has no JSON mapping; returning null",
        column_name
    );
    JsonValue::Null
}
