//! In-process connection store.

use super::{ConnectionStore, Replacement, StoredConnection};
use crate::config::ConnectionConfig;
use crate::error::{Result, SchemaImporterError};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Records plus the id counter; shared by the memory and file stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ConnectionTable {
    pub(super) next_id: u64,
    pub(super) records: BTreeMap<u64, StoredConnection>,
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: BTreeMap::new(),
        }
    }
}

impl ConnectionTable {
    pub(super) fn insert(&mut self, config: ConnectionConfig) -> Result<StoredConnection> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| SchemaImporterError::store("connection id space exhausted"))?;

        let now = Utc::now();
        let stored = StoredConnection {
            id,
            config,
            created_at: now,
            updated_at: now,
        };
        self.records.insert(id, stored.clone());
        Ok(stored)
    }

    pub(super) fn replace(
        &mut self,
        id: u64,
        expected: DateTime<Utc>,
        config: ConnectionConfig,
    ) -> Replacement {
        let Some(stored) = self.records.get_mut(&id) else {
            return Replacement::Missing;
        };
        if stored.updated_at != expected {
            return Replacement::Stale;
        }
        stored.config = config;
        stored.updated_at = later_than(stored.updated_at);
        Replacement::Replaced(stored.clone())
    }

    pub(super) fn remove(&mut self, id: u64) -> bool {
        self.records.remove(&id).is_some()
    }

    pub(super) fn all(&self) -> Vec<StoredConnection> {
        self.records.values().cloned().collect()
    }
}

/// Current time, bumped past `previous` so every write moves `updated_at`.
fn later_than(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    previous
        .checked_add_signed(TimeDelta::nanoseconds(1))
        .map_or(now, |next| now.max(next))
}

/// Connection store held in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<ConnectionTable>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn get(&self, id: u64) -> Result<Option<StoredConnection>> {
        Ok(self.table.read().await.records.get(&id).cloned())
    }

    async fn save(&self, config: ConnectionConfig) -> Result<StoredConnection> {
        self.table.write().await.insert(config)
    }

    async fn replace(
        &self,
        id: u64,
        expected: DateTime<Utc>,
        config: ConnectionConfig,
    ) -> Result<Replacement> {
        Ok(self.table.write().await.replace(id, expected, config))
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        Ok(self.table.write().await.remove(id))
    }

    async fn list(&self) -> Result<Vec<StoredConnection>> {
        Ok(self.table.read().await.all())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::DatabaseKind;

    fn config(table: &str) -> ConnectionConfig {
        ConnectionConfig::new(DatabaseKind::MySql, "localhost")
            .with_credentials("reader", "pw")
            .with_database("shop")
            .with_table(table)
    }

    #[tokio::test]
    async fn test_save_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let first = store.save(config("orders")).await.unwrap();
        let second = store.save(config("customers")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.list().await.unwrap().len(), 2);
        assert_eq!(
            store.get(2).await.unwrap().unwrap().config.table,
            "customers"
        );
    }

    #[tokio::test]
    async fn test_replace_and_delete() {
        let store = MemoryStore::new();
        let saved = store.save(config("orders")).await.unwrap();

        let Replacement::Replaced(updated) = store
            .replace(saved.id, saved.updated_at, config("invoices"))
            .await
            .unwrap()
        else {
            unreachable!("the record is unchanged since it was saved");
        };
        assert_eq!(updated.config.table, "invoices");
        assert_eq!(updated.created_at, saved.created_at);
        assert!(updated.updated_at > saved.updated_at);

        let missing = store
            .replace(99, saved.updated_at, config("x"))
            .await
            .unwrap();
        assert_eq!(missing, Replacement::Missing);
        assert!(store.delete(saved.id).await.unwrap());
        assert!(!store.delete(saved.id).await.unwrap());
        assert!(store.get(saved.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_against_an_old_version_is_stale() {
        let store = MemoryStore::new();
        let saved = store.save(config("orders")).await.unwrap();
        store
            .replace(saved.id, saved.updated_at, config("customers"))
            .await
            .unwrap();

        let late = store
            .replace(saved.id, saved.updated_at, config("invoices"))
            .await
            .unwrap();

        assert_eq!(late, Replacement::Stale);
        let current = store.get(saved.id).await.unwrap().unwrap();
        assert_eq!(current.config.table, "customers");
    }

    #[test]
    fn test_later_than_always_advances() {
        let future = Utc::now() + TimeDelta::hours(1);
        assert!(later_than(future) > future);
        assert!(later_than(DateTime::<Utc>::MIN_UTC) > DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_id_exhaustion_is_a_store_error() {
        let mut table = ConnectionTable {
            next_id: u64::MAX,
            records: BTreeMap::new(),
        };
        let err = table.insert(config("orders")).unwrap_err();
        assert!(matches!(err, SchemaImporterError::Store { .. }));
    }
}
