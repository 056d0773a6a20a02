//! Live connection probe.
//!
//! Runs the ordered checks against a real server and reports which ones were
//! attempted and how they came out:
//!
//! 1. connectivity (credentials and database existence)
//! 2. table exists
//! 3. schema exists (postgresql)
//! 4. supported version
//! 5. CREATE privilege on schema, then on database (postgresql, admin session)
//!
//! A failed connectivity check ends the probe. Other failures end it only in
//! [`ProbeMode::FailFast`]. Every connection the probe opens is closed before
//! it returns.

pub mod driver;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgresql")]
pub mod postgres;
mod result;

pub use driver::{ConnectTarget, ProbeDriver, ProbeSession};
#[cfg(feature = "mysql")]
pub use mysql::MySqlDriver;
#[cfg(feature = "postgresql")]
pub use postgres::PostgresDriver;
pub use result::{Check, ProbeError, ProbeMode, ProbeResult};

use crate::config::{AdminCredentials, ConnectionConfig, ProbeSettings};
use crate::error::{Result, SchemaImporterError};
use crate::models::{DatabaseKind, ServerVersion};
use crate::validation::validate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Probes source connections with per-kind drivers.
///
/// Safe to share between concurrent evaluations; each call to
/// [`DatabaseProbe::probe`] opens its own connections.
#[derive(Clone)]
pub struct DatabaseProbe {
    drivers: BTreeMap<DatabaseKind, Arc<dyn ProbeDriver>>,
    admin: Arc<AdminCredentials>,
    settings: ProbeSettings,
}

impl DatabaseProbe {
    /// Probe with every driver compiled into this build.
    pub fn new(admin: Arc<AdminCredentials>, settings: ProbeSettings) -> Self {
        #[allow(unused_mut)]
        let mut probe = Self::without_drivers(admin, settings);
        #[cfg(feature = "mysql")]
        {
            probe = probe.with_driver(Arc::new(MySqlDriver));
        }
        #[cfg(feature = "postgresql")]
        {
            probe = probe.with_driver(Arc::new(PostgresDriver));
        }
        probe
    }

    /// Probe with no drivers registered.
    pub fn without_drivers(admin: Arc<AdminCredentials>, settings: ProbeSettings) -> Self {
        Self {
            drivers: BTreeMap::new(),
            admin,
            settings,
        }
    }

    /// Registers `driver` for its kind, replacing any previous one.
    pub fn with_driver(mut self, driver: Arc<dyn ProbeDriver>) -> Self {
        self.drivers.insert(driver.kind(), driver);
        self
    }

    fn driver(&self, config: &ConnectionConfig) -> Result<&dyn ProbeDriver> {
        self.drivers
            .get(&config.kind)
            .map(|driver| &**driver)
            .ok_or_else(|| {
                SchemaImporterError::unsupported_feature("connection probe", config.kind.as_str())
            })
    }

    /// Probes `config` against its server.
    ///
    /// Probe failures are data in the returned [`ProbeResult`]; the same
    /// config against an unchanged server gives the same result.
    ///
    /// # Errors
    /// Returns a configuration error for a structurally invalid config, and
    /// an unsupported-feature error when no driver is registered for the kind.
    pub async fn probe(&self, config: &ConnectionConfig, mode: ProbeMode) -> Result<ProbeResult> {
        if let Err(e) = validate(config) {
            return Err(SchemaImporterError::configuration(format!(
                "probe called with an incomplete connection config: {}",
                e.code()
            )));
        }
        let driver = self.driver(config)?;
        let target = ConnectTarget::for_config(config);
        let mut result = ProbeResult::new(config.kind);

        debug!("Probing {}", config);

        let mut session = match driver.connect(&target, &self.settings).await {
            Ok(session) => session,
            Err(reason) => {
                info!(
                    "Connectivity check failed for {}: {}",
                    config,
                    reason.code()
                );
                result.record_connect_failure(reason);
                return Ok(result);
            }
        };
        result.record(Check::Connectivity, true);

        let proceed = run_session_checks(session.as_mut(), config, mode, &mut result).await;
        close_session(session).await;

        if proceed && config.kind.checks_create_privileges() {
            self.check_privileges(driver, &target, config, mode, &mut result)
                .await;
        }

        debug!(
            "Probe of {} finished: success={} checks={}",
            config,
            result.success(),
            result.checks().len()
        );
        Ok(result)
    }

    async fn check_privileges(
        &self,
        driver: &dyn ProbeDriver,
        target: &ConnectTarget,
        config: &ConnectionConfig,
        mode: ProbeMode,
        result: &mut ProbeResult,
    ) {
        let Some(admin) = self.admin.for_kind(config.kind) else {
            warn!(
                "No administrative credentials for {}; privilege checks recorded as failed",
                config.kind
            );
            fail_privileges(result, mode);
            return;
        };

        let mut session = match driver
            .connect(&target.with_credentials(admin.clone()), &self.settings)
            .await
        {
            Ok(session) => session,
            Err(reason) => {
                warn!(
                    "Administrative connection failed ({}); privilege checks recorded as failed",
                    reason.code()
                );
                fail_privileges(result, mode);
                return;
            }
        };

        let schema = config.schema_name().unwrap_or_default();
        let on_schema = session
            .has_schema_create_privilege(&config.user, schema)
            .await
            .unwrap_or_else(|e| {
                warn!("Schema privilege check failed: {}", e);
                false
            });

        if result.record_step(Check::CreatePrivilegeOnSchema, on_schema, mode) {
            let on_database = session
                .has_database_create_privilege(&config.user, &config.database)
                .await
                .unwrap_or_else(|e| {
                    warn!("Database privilege check failed: {}", e);
                    false
                });
            result.record(Check::CreatePrivilegeOnDatabase, on_database);
        }

        close_session(session).await;
    }
}

impl std::fmt::Debug for DatabaseProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseProbe")
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .field("admin", &self.admin)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Table, schema and version checks on the tested user's own session.
///
/// Returns whether the probe should go on to the privilege checks.
async fn run_session_checks(
    session: &mut dyn ProbeSession,
    config: &ConnectionConfig,
    mode: ProbeMode,
    result: &mut ProbeResult,
) -> bool {
    let table = config.table.trim();
    let table_exists = match session.table_names(config.table_scope()).await {
        Ok(names) => names.iter().any(|name| name == table),
        Err(e) => {
            warn!("Table lookup failed for {}: {}", config, e);
            false
        }
    };
    if !result.record_step(Check::TableExists, table_exists, mode) {
        return false;
    }

    if let Some(schema) = config.table_scope() {
        let schema_exists = match session.schema_names().await {
            Ok(names) => names.iter().any(|name| name == schema),
            Err(e) => {
                warn!("Schema lookup failed for {}: {}", config, e);
                false
            }
        };
        if !result.record_step(Check::SchemaExists, schema_exists, mode) {
            return false;
        }
    }

    let raw = session.server_version().await.unwrap_or_else(|e| {
        warn!("Version lookup failed for {}: {}", config, e);
        None
    });
    let version = ServerVersion::parse_or_default(raw.as_deref());
    result.set_server_version(version);

    let supported = config.kind.supports_version(version);
    if !supported {
        info!(
            "{} server version {} (reported {:?}) is not supported",
            config.kind, version, raw
        );
    }
    result.record_step(Check::SupportedVersion, supported, mode)
}

fn fail_privileges(result: &mut ProbeResult, mode: ProbeMode) {
    if result.record_step(Check::CreatePrivilegeOnSchema, false, mode) {
        result.record(Check::CreatePrivilegeOnDatabase, false);
    }
}

async fn close_session(session: Box<dyn ProbeSession>) {
    if let Err(e) = session.close().await {
        warn!("Failed to close probe connection cleanly: {}", e);
    }
}
