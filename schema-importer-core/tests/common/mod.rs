//! Scripted fake servers shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use schema_importer_core::probe::{ConnectTarget, ProbeDriver, ProbeSession};
use schema_importer_core::{
    AdminCredentials, ConnectionConfig, ConnectionOrchestrator, DatabaseKind, DatabaseProbe,
    ProbeError, ProbeSettings, SchemaImporterError,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-secret";
pub const USER: &str = "importer";
pub const PASSWORD: &str = "importer-secret";

/// What a fake server knows and how it answers.
#[derive(Debug, Clone)]
pub struct FakeServer {
    pub kind: DatabaseKind,
    pub reachable: bool,
    /// login -> password
    pub logins: BTreeMap<String, String>,
    pub databases: Vec<String>,
    /// schema (postgresql) or database (mysql) -> base tables
    pub tables: BTreeMap<String, Vec<String>>,
    pub schemas: Vec<String>,
    pub version: Option<String>,
    pub schema_privilege: bool,
    pub database_privilege: bool,
    pub fail_table_query: bool,
    /// host -> time a connect to it takes
    pub connect_delays: BTreeMap<String, Duration>,
}

impl FakeServer {
    /// A MySQL 8.0 server with database `shop` holding `orders`.
    pub fn mysql() -> Self {
        Self {
            kind: DatabaseKind::MySql,
            reachable: true,
            logins: BTreeMap::from([
                (USER.to_string(), PASSWORD.to_string()),
                (ADMIN_USER.to_string(), ADMIN_PASSWORD.to_string()),
            ]),
            databases: vec!["shop".to_string()],
            tables: BTreeMap::from([("shop".to_string(), vec!["orders".to_string()])]),
            schemas: Vec::new(),
            version: Some("8.0.36".to_string()),
            schema_privilege: true,
            database_privilege: true,
            fail_table_query: false,
            connect_delays: BTreeMap::new(),
        }
    }

    /// A PostgreSQL 12 server with `sales.public.orders`.
    pub fn postgres() -> Self {
        Self {
            kind: DatabaseKind::PostgreSql,
            reachable: true,
            logins: BTreeMap::from([
                (USER.to_string(), PASSWORD.to_string()),
                (ADMIN_USER.to_string(), ADMIN_PASSWORD.to_string()),
            ]),
            databases: vec!["sales".to_string()],
            tables: BTreeMap::from([("public".to_string(), vec!["orders".to_string()])]),
            schemas: vec!["pg_catalog".to_string(), "public".to_string()],
            version: Some("12.18 (Debian 12.18-1.pgdg120+2)".to_string()),
            schema_privilege: true,
            database_privilege: true,
            fail_table_query: false,
            connect_delays: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: Option<&str>) -> Self {
        self.version = version.map(str::to_string);
        self
    }

    /// Holds every connection to `host` for `delay` before answering.
    pub fn with_connect_delay(mut self, host: &str, delay: Duration) -> Self {
        self.connect_delays.insert(host.to_string(), delay);
        self
    }
}

/// Counters observed across every session a driver opened.
#[derive(Debug, Default)]
pub struct SessionStats {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub connect_attempts: AtomicUsize,
    pub logins: Mutex<Vec<String>>,
    pub privilege_subjects: Mutex<Vec<String>>,
}

impl SessionStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> Vec<String> {
        self.logins.lock().unwrap().clone()
    }

    pub fn privilege_subjects(&self) -> Vec<String> {
        self.privilege_subjects.lock().unwrap().clone()
    }
}

/// Probe driver answering from a `FakeServer`.
#[derive(Debug, Clone)]
pub struct FakeDriver {
    pub server: FakeServer,
    pub stats: Arc<SessionStats>,
}

impl FakeDriver {
    pub fn new(server: FakeServer) -> Self {
        Self {
            server,
            stats: Arc::new(SessionStats::default()),
        }
    }
}

#[async_trait]
impl ProbeDriver for FakeDriver {
    fn kind(&self) -> DatabaseKind {
        self.server.kind
    }

    async fn connect(
        &self,
        target: &ConnectTarget,
        _settings: &ProbeSettings,
    ) -> Result<Box<dyn ProbeSession>, ProbeError> {
        self.stats.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.server.connect_delays.get(&target.host) {
            tokio::time::sleep(*delay).await;
        }
        if !self.server.reachable {
            return Err(ProbeError::ConnectionFailed);
        }

        let user = target.credentials.username();
        let password = target.credentials.password().expose();
        if self.server.logins.get(user).map(String::as_str) != Some(password) {
            return Err(ProbeError::InvalidCredentials);
        }
        if !self.server.databases.contains(&target.database) {
            return Err(ProbeError::InvalidDatabase);
        }

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        self.stats.logins.lock().unwrap().push(user.to_string());
        Ok(Box::new(FakeSession {
            server: self.server.clone(),
            database: target.database.clone(),
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct FakeSession {
    server: FakeServer,
    database: String,
    stats: Arc<SessionStats>,
}

#[async_trait]
impl ProbeSession for FakeSession {
    async fn table_names(
        &mut self,
        schema: Option<&str>,
    ) -> schema_importer_core::Result<Vec<String>> {
        if self.server.fail_table_query {
            return Err(SchemaImporterError::query_failed(
                "Failed to list tables",
                std::io::Error::other("permission denied for information_schema"),
            ));
        }
        let scope = schema.unwrap_or(&self.database);
        Ok(self.server.tables.get(scope).cloned().unwrap_or_default())
    }

    async fn schema_names(&mut self) -> schema_importer_core::Result<Vec<String>> {
        Ok(self.server.schemas.clone())
    }

    async fn server_version(&mut self) -> schema_importer_core::Result<Option<String>> {
        Ok(self.server.version.clone())
    }

    async fn has_schema_create_privilege(
        &mut self,
        user: &str,
        _schema: &str,
    ) -> schema_importer_core::Result<bool> {
        self.stats
            .privilege_subjects
            .lock()
            .unwrap()
            .push(user.to_string());
        Ok(self.server.schema_privilege)
    }

    async fn has_database_create_privilege(
        &mut self,
        user: &str,
        _database: &str,
    ) -> schema_importer_core::Result<bool> {
        self.stats
            .privilege_subjects
            .lock()
            .unwrap()
            .push(user.to_string());
        Ok(self.server.database_privilege)
    }

    fn kind(&self) -> DatabaseKind {
        self.server.kind
    }

    async fn close(self: Box<Self>) -> schema_importer_core::Result<()> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn admin_credentials() -> Arc<AdminCredentials> {
    Arc::new(AdminCredentials::from_lookup(|name| match name {
        "MYSQL_USER" | "POSTGRES_USER" => Some(ADMIN_USER.to_string()),
        "MYSQL_PASSWORD" | "POSTGRES_PASSWORD" => Some(ADMIN_PASSWORD.to_string()),
        _ => None,
    }))
}

pub fn probe_with(driver: &FakeDriver, admin: Arc<AdminCredentials>) -> DatabaseProbe {
    DatabaseProbe::without_drivers(admin, ProbeSettings::default())
        .with_driver(Arc::new(driver.clone()))
}

pub fn orchestrator_with(driver: &FakeDriver) -> ConnectionOrchestrator {
    ConnectionOrchestrator::new(probe_with(driver, admin_credentials()))
}

pub fn mysql_config() -> ConnectionConfig {
    ConnectionConfig::new(DatabaseKind::MySql, "mysql.internal")
        .with_credentials(USER, PASSWORD)
        .with_database("shop")
        .with_table("orders")
}

pub fn postgres_config() -> ConnectionConfig {
    ConnectionConfig::new(DatabaseKind::PostgreSql, "pg.internal")
        .with_credentials(USER, PASSWORD)
        .with_database("sales")
        .with_schema("public")
        .with_table("orders")
}
