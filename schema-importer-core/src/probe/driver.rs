//! Driver seam between the probe and a concrete database engine.
//!
//! A [`ProbeDriver`] opens one connection; the [`ProbeSession`] it returns
//! answers the catalog questions the probe asks and is closed explicitly.

use crate::config::{ConnectionConfig, ProbeSettings};
use crate::error::{SchemaImporterError, redact_database_url};
use crate::models::DatabaseKind;
use crate::probe::ProbeError;
use crate::security::Credentials;
use async_trait::async_trait;

/// Where and as whom a driver connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// Database family
    pub kind: DatabaseKind,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database to connect to
    pub database: String,
    /// Login credentials
    pub credentials: Credentials,
}

impl ConnectTarget {
    /// Target for the user and database named in `config`.
    pub fn for_config(config: &ConnectionConfig) -> Self {
        Self {
            kind: config.kind,
            host: config.host.clone(),
            port: config.port,
            database: config.database.clone(),
            credentials: config.credentials(),
        }
    }

    /// Same server and database, different login.
    pub fn with_credentials(&self, credentials: Credentials) -> Self {
        Self {
            credentials,
            ..self.clone()
        }
    }

    /// Connection URL with percent-encoded user, password and database.
    ///
    /// # Errors
    /// Returns a configuration error if the host cannot form a valid URL.
    pub fn connection_url(&self) -> crate::Result<String> {
        let invalid = || {
            SchemaImporterError::configuration(format!(
                "cannot build a {} connection URL for host '{}'",
                self.kind, self.host
            ))
        };

        let mut url = url::Url::parse(&format!("{}://localhost", self.kind.url_scheme()))
            .map_err(|_| invalid())?;
        url.set_host(Some(&self.host)).map_err(|_| invalid())?;
        url.set_port(Some(self.port)).map_err(|()| invalid())?;
        url.set_username(self.credentials.username())
            .map_err(|()| invalid())?;
        if self.credentials.has_password() {
            url.set_password(Some(self.credentials.password().expose()))
                .map_err(|()| invalid())?;
        }
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .clear()
            .push(&self.database);
        Ok(url.to_string())
    }

    /// Connection URL safe for logs.
    pub fn redacted_url(&self) -> String {
        self.connection_url()
            .map_or_else(
                |_| "<redacted>".to_string(),
                |url| redact_database_url(&url),
            )
    }
}

/// Opens probe sessions for one database kind.
#[async_trait]
pub trait ProbeDriver: Send + Sync {
    /// Kind this driver connects to.
    fn kind(&self) -> DatabaseKind;

    /// Opens a connection to `target`.
    ///
    /// Failures are classified: rejected credentials, an unknown database,
    /// or a generic connection failure (unreachable, TLS, timeout).
    async fn connect(
        &self,
        target: &ConnectTarget,
        settings: &ProbeSettings,
    ) -> Result<Box<dyn ProbeSession>, ProbeError>;
}

/// One open connection answering catalog questions.
///
/// Query methods return `Err` only for failed queries; the probe records
/// those as failed checks.
#[async_trait]
pub trait ProbeSession: Send {
    /// Base table names in `schema`, or in the connection's default scope.
    async fn table_names(&mut self, schema: Option<&str>) -> crate::Result<Vec<String>>;

    /// Schema names visible to this connection.
    async fn schema_names(&mut self) -> crate::Result<Vec<String>> {
        Err(SchemaImporterError::unsupported_feature("schema listing", self.kind().as_str()))
    }

    /// Raw server version string.
    async fn server_version(&mut self) -> crate::Result<Option<String>>;

    /// Whether `user` holds CREATE on `schema`.
    async fn has_schema_create_privilege(
        &mut self,
        _user: &str,
        _schema: &str,
    ) -> crate::Result<bool> {
        Err(SchemaImporterError::unsupported_feature(
            "schema privilege check",
            self.kind().as_str(),
        ))
    }

    /// Whether `user` holds CREATE on `database`.
    async fn has_database_create_privilege(
        &mut self,
        _user: &str,
        _database: &str,
    ) -> crate::Result<bool> {
        Err(SchemaImporterError::unsupported_feature(
            "database privilege check",
            self.kind().as_str(),
        ))
    }

    /// Kind of the connected server.
    fn kind(&self) -> DatabaseKind;

    /// Closes the connection.
    async fn close(self: Box<Self>) -> crate::Result<()>;
}

/// Runs one driver future under `limit`, mapping both failure modes to a
/// query error labelled with `context`.
#[cfg(any(feature = "mysql", feature = "postgresql"))]
pub(crate) async fn with_timeout<T, F>(
    limit: std::time::Duration,
    context: &str,
    fut: F,
) -> crate::Result<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>> + Send,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(SchemaImporterError::query_failed(context, e)),
        Err(_) => Err(SchemaImporterError::query_failed(
            context,
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("timed out after {}s", limit.as_secs_f64()),
            ),
        )),
    }
}

/// Opens one connection under `limit`; a timeout surfaces as an I/O error.
#[cfg(any(feature = "mysql", feature = "postgresql"))]
pub(crate) async fn connect_within<C>(
    limit: std::time::Duration,
    target: &ConnectTarget,
) -> Result<C, sqlx::Error>
where
    C: sqlx::Connection,
{
    let url = target
        .connection_url()
        .map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;
    match tokio::time::timeout(limit, C::connect(&url)).await {
        Ok(result) => result,
        Err(_) => Err(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("connect timed out after {}s", limit.as_secs_f64()),
        ))),
    }
}
