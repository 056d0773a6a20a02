//! Source connection operations with transport-level error mapping.
//!
//! Each operation returns either its payload or a [`ServiceError`] that knows
//! its status code and user-facing message. Creating and updating persist a
//! config only after it has passed a fail-fast evaluation; testing never
//! persists. An update stores exactly the config it evaluated, and only if
//! the record has not changed in the meantime.

use crate::config::{ConnectionConfig, ConnectionUpdate};
use crate::error::SchemaImporterError;
use crate::introspection::{Introspectors, InvalidRowLimit, RowLimit};
use crate::models::ColumnInfo;
use crate::orchestrator::{ConnectionOrchestrator, Failure, Outcome};
use crate::probe::{ProbeError, ProbeMode, ProbeResult};
use crate::store::{ConnectionStore, PublicConnection, Replacement, StoredConnection};
use crate::validation::ValidationError;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Failure of a service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No stored connection has the requested id
    #[error("Source connection not found.")]
    NotFound,
    /// The config is structurally invalid
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A live check failed
    #[error(transparent)]
    Probe(#[from] ProbeError),
    /// A request parameter is out of range
    #[error("{0}")]
    InvalidRequest(String),
    /// The connection changed while an update to it was being evaluated
    #[error("Source connection was changed by another request; retry the update.")]
    Conflict,
    /// Fatal condition inside this process
    #[error(transparent)]
    Internal(#[from] SchemaImporterError),
}

impl ServiceError {
    /// HTTP-style status code.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Validation(_) | Self::Probe(_) | Self::InvalidRequest(_) => 422,
            Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation(e) => e.code(),
            Self::Probe(e) => e.code(),
            Self::InvalidRequest(_) => "invalid_request",
            Self::Conflict => "conflict",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Response body for this error.
    pub fn response(&self) -> ErrorResponse {
        ErrorResponse {
            status: self.status_code(),
            code: self.code(),
            detail: self.to_string(),
        }
    }
}

impl From<Failure> for ServiceError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Validation(e) => Self::Validation(e),
            Failure::Probe(e) => Self::Probe(e),
        }
    }
}

impl From<InvalidRowLimit> for ServiceError {
    fn from(e: InvalidRowLimit) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

/// Serializable error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    /// Status code
    pub status: u16,
    /// Machine-readable code
    pub code: &'static str,
    /// User-facing message
    pub detail: String,
}

/// Result type of service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Create, test, update, delete, and introspect source connections.
#[derive(Clone)]
pub struct SourceConnectionService {
    store: Arc<dyn ConnectionStore>,
    orchestrator: ConnectionOrchestrator,
    introspectors: Introspectors,
}

impl SourceConnectionService {
    /// Creates a service over its collaborators.
    pub fn new(
        store: Arc<dyn ConnectionStore>,
        orchestrator: ConnectionOrchestrator,
        introspectors: Introspectors,
    ) -> Self {
        Self {
            store,
            orchestrator,
            introspectors,
        }
    }

    /// Evaluates `config` fail-fast and stores it if every check passes.
    ///
    /// # Errors
    /// The first validation or probe failure (422), or a fatal error (500).
    pub async fn create(&self, config: ConnectionConfig) -> ServiceResult<PublicConnection> {
        self.require_passing(&config).await?;
        let stored = self.store.save(config).await?;
        info!(
            "Created source connection {} ({})",
            stored.id,
            stored.config
        );
        Ok(stored.to_public())
    }

    /// Evaluates `config` in collect mode without storing it.
    ///
    /// # Errors
    /// A validation failure (422), or a fatal error (500).
    pub async fn test_new(&self, config: &ConnectionConfig) -> ServiceResult<ProbeResult> {
        self.collect(config).await
    }

    /// Evaluates the stored connection `id` in collect mode.
    ///
    /// # Errors
    /// `NotFound` (404), a validation failure (422), or a fatal error (500).
    pub async fn test_existing(&self, id: u64) -> ServiceResult<ProbeResult> {
        let stored = self.stored(id).await?;
        self.collect(&stored.config).await
    }

    /// Applies `update` to connection `id`, re-evaluates it fail-fast, and
    /// stores the evaluated config if every check passes.
    ///
    /// # Errors
    /// `NotFound` (404), `Conflict` (409) when the connection changed during
    /// evaluation, the first validation or probe failure (422), or a fatal
    /// error (500).
    pub async fn update(
        &self,
        id: u64,
        update: &ConnectionUpdate,
    ) -> ServiceResult<PublicConnection> {
        let stored = self.stored(id).await?;
        let candidate = stored.config.apply(update);
        self.require_passing(&candidate).await?;

        match self.store.replace(id, stored.updated_at, candidate).await? {
            Replacement::Replaced(updated) => {
                info!("Updated source connection {} ({})", id, updated.config);
                Ok(updated.to_public())
            }
            Replacement::Missing => Err(ServiceError::NotFound),
            Replacement::Stale => {
                warn!(
                    "Source connection {} changed while its update was evaluated",
                    id
                );
                Err(ServiceError::Conflict)
            }
        }
    }

    /// Removes connection `id`.
    ///
    /// # Errors
    /// `NotFound` (404), or a fatal error (500).
    pub async fn delete(&self, id: u64) -> ServiceResult<()> {
        if !self.store.delete(id).await? {
            return Err(ServiceError::NotFound);
        }
        info!("Deleted source connection {}", id);
        Ok(())
    }

    /// Public view of connection `id`.
    ///
    /// # Errors
    /// `NotFound` (404), or a fatal error (500).
    pub async fn get(&self, id: u64) -> ServiceResult<PublicConnection> {
        Ok(self.stored(id).await?.to_public())
    }

    /// Public views of every stored connection.
    ///
    /// # Errors
    /// A fatal store error (500).
    pub async fn list(&self) -> ServiceResult<Vec<PublicConnection>> {
        Ok(self
            .store
            .list()
            .await?
            .iter()
            .map(StoredConnection::to_public)
            .collect())
    }

    /// Table names reachable with connection `id`.
    ///
    /// # Errors
    /// `NotFound` (404), a connection failure (422), or a fatal error (500).
    pub async fn tables(&self, id: u64) -> ServiceResult<Vec<String>> {
        let stored = self.stored(id).await?;
        self.introspectors
            .for_kind(stored.config.kind)?
            .list_tables(&stored.config)
            .await
            .map_err(introspection_error)
    }

    /// Columns of the table configured on connection `id`.
    ///
    /// # Errors
    /// `NotFound` (404), a missing table or connection failure (422), or a
    /// fatal error (500).
    pub async fn table_schema(&self, id: u64) -> ServiceResult<Vec<ColumnInfo>> {
        let stored = self.stored(id).await?;
        self.introspectors
            .for_kind(stored.config.kind)?
            .get_table_schema(&stored.config)
            .await
            .map_err(introspection_error)?
            .ok_or(ServiceError::Probe(ProbeError::InvalidTable))
    }

    /// Up to `limit` rows (1..=100) of the table configured on connection `id`.
    ///
    /// # Errors
    /// An invalid limit (422), `NotFound` (404), a missing table or
    /// connection failure (422), or a fatal error (500).
    pub async fn rows(&self, id: u64, limit: u32) -> ServiceResult<Vec<serde_json::Value>> {
        let limit = RowLimit::new(limit)?;
        let stored = self.stored(id).await?;
        self.introspectors
            .for_kind(stored.config.kind)?
            .get_table_rows(&stored.config, limit)
            .await
            .map_err(introspection_error)?
            .ok_or(ServiceError::Probe(ProbeError::InvalidTable))
    }

    async fn stored(&self, id: u64) -> ServiceResult<StoredConnection> {
        self.store.get(id).await?.ok_or(ServiceError::NotFound)
    }

    async fn require_passing(&self, config: &ConnectionConfig) -> ServiceResult<ProbeResult> {
        let outcome = self
            .orchestrator
            .evaluate(config, ProbeMode::FailFast)
            .await?;
        match outcome {
            Outcome::Failed(failure) => {
                info!("Rejected {}: {}", config, failure.code());
                Err(failure.into())
            }
            Outcome::Completed(result) => match result.first_failure() {
                Some(reason) => Err(reason.into()),
                None => Ok(result),
            },
        }
    }

    async fn collect(&self, config: &ConnectionConfig) -> ServiceResult<ProbeResult> {
        let outcome = self
            .orchestrator
            .evaluate(config, ProbeMode::Collect)
            .await?;
        match outcome {
            Outcome::Completed(result) => Ok(result),
            Outcome::Failed(failure) => Err(failure.into()),
        }
    }
}

impl std::fmt::Debug for SourceConnectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConnectionService")
            .field("orchestrator", &self.orchestrator)
            .field("introspectors", &self.introspectors)
            .finish_non_exhaustive()
    }
}

fn introspection_error(error: SchemaImporterError) -> ServiceError {
    match error {
        SchemaImporterError::Connection { .. } => {
            warn!("Introspection could not connect: {}", error);
            ServiceError::Probe(ProbeError::ConnectionFailed)
        }
        other => ServiceError::Internal(other),
    }
}
