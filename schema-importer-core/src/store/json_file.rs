//! Connection store persisted as one JSON document.
//!
//! The file is the only place a source password is ever serialized. Every
//! mutation rewrites the whole document through a temporary file and a
//! rename, so readers never see a partial write. Mutations also hold an
//! exclusive lock on a sidecar `.lock` file from load to rename, which
//! serializes writers in different processes sharing one store.

use super::memory::ConnectionTable;
use super::{ConnectionStore, Replacement, StoredConnection};
use crate::config::ConnectionConfig;
use crate::error::{Result, SchemaImporterError};
use crate::models::DatabaseKind;
use crate::security::Password;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// On-disk layout.
#[derive(Serialize, Deserialize)]
struct StoreDocument {
    next_id: u64,
    connections: Vec<StoredRecord>,
}

/// On-disk record; unlike `ConnectionConfig`, it carries the password.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    id: u64,
    kind: DatabaseKind,
    host: String,
    port: u16,
    user: String,
    password: String,
    database: String,
    table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&StoredConnection> for StoredRecord {
    fn from(stored: &StoredConnection) -> Self {
        let config = &stored.config;
        Self {
            id: stored.id,
            kind: config.kind,
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password: config.password.expose().to_string(),
            database: config.database.clone(),
            table: config.table.clone(),
            schema: config.schema.clone(),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}

impl From<StoredRecord> for StoredConnection {
    fn from(record: StoredRecord) -> Self {
        let mut config = ConnectionConfig::new(record.kind, record.host)
            .with_port(record.port)
            .with_database(record.database)
            .with_table(record.table);
        config.user = record.user;
        config.password = Password::new(record.password);
        config.schema = record.schema;
        Self {
            id: record.id,
            config,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Connection store backed by a JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Store at `path`; the file is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<ConnectionTable> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ConnectionTable::default());
            }
            Err(e) => {
                return Err(SchemaImporterError::io(
                    format!("Failed to read {}", self.path.display()),
                    e,
                ));
            }
        };

        let document: StoreDocument = serde_json::from_str(&contents).map_err(|e| {
            SchemaImporterError::serialization(
                format!("Failed to parse {}", self.path.display()),
                e,
            )
        })?;

        let records = document
            .connections
            .into_iter()
            .map(|record| (record.id, StoredConnection::from(record)))
            .collect::<std::collections::BTreeMap<_, _>>();

        let highest = records.keys().next_back().copied().unwrap_or(0);
        if document.next_id <= highest {
            return Err(SchemaImporterError::store(format!(
                "{} is inconsistent: next_id {} does not exceed stored id {}",
                self.path.display(),
                document.next_id,
                highest
            )));
        }

        Ok(ConnectionTable {
            next_id: document.next_id,
            records,
        })
    }

    /// Blocks until this process holds the store's file lock; dropping the
    /// returned handle releases it.
    async fn lock_file(&self) -> Result<std::fs::File> {
        let lock_path = self.path.with_extension("json.lock");
        let context = format!("Failed to lock {}", lock_path.display());
        tokio::task::spawn_blocking(move || open_locked(&lock_path))
            .await
            .map_err(|e| SchemaImporterError::store(format!("Store lock task failed: {e}")))?
            .map_err(|e| SchemaImporterError::io(context, e))
    }

    async fn persist(&self, table: &ConnectionTable) -> Result<()> {
        let document = StoreDocument {
            next_id: table.next_id,
            connections: table.records.values().map(StoredRecord::from).collect(),
        };
        let json_data = serde_json::to_string_pretty(&document)
            .map_err(|e| SchemaImporterError::serialization("Connection store", e))?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json_data)
            .await
            .map_err(|e| SchemaImporterError::Io {
                context: format!("Failed to write to {}", temp_path.display()),
                source: e,
            })?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| SchemaImporterError::Io {
                context: format!("Failed to replace {}", self.path.display()),
                source: e,
            })?;

        tracing::debug!(
            "Wrote {} connection(s) to {}",
            table.records.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn open_locked(path: &Path) -> std::io::Result<std::fs::File> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.lock()?;
    Ok(file)
}

#[async_trait]
impl ConnectionStore for JsonFileStore {
    async fn get(&self, id: u64) -> Result<Option<StoredConnection>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.records.remove(&id))
    }

    async fn save(&self, config: ConnectionConfig) -> Result<StoredConnection> {
        let _guard = self.lock.lock().await;
        let _file_lock = self.lock_file().await?;
        let mut table = self.load().await?;
        let stored = table.insert(config)?;
        self.persist(&table).await?;
        Ok(stored)
    }

    async fn replace(
        &self,
        id: u64,
        expected: DateTime<Utc>,
        config: ConnectionConfig,
    ) -> Result<Replacement> {
        let _guard = self.lock.lock().await;
        let _file_lock = self.lock_file().await?;
        let mut table = self.load().await?;
        let replacement = table.replace(id, expected, config);
        if matches!(replacement, Replacement::Replaced(_)) {
            self.persist(&table).await?;
        }
        Ok(replacement)
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let _file_lock = self.lock_file().await?;
        let mut table = self.load().await?;
        if !table.remove(id) {
            return Ok(false);
        }
        self.persist(&table).await?;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<StoredConnection>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.all())
    }
}
