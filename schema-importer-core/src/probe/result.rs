//! Probe result types: named checks, probe failure reasons, and the result set.

use crate::models::{DatabaseKind, ServerVersion};
use serde::Serialize;
use serde::ser::SerializeMap;
use thiserror::Error;

/// A named check performed by the probe, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    /// A connection could be opened with the tested credentials
    Connectivity,
    /// The configured table is listed under the connection (and schema)
    TableExists,
    /// The configured schema exists (postgresql)
    SchemaExists,
    /// The server version satisfies the kind's support policy
    SupportedVersion,
    /// The tested user may CREATE in the configured schema (postgresql)
    CreatePrivilegeOnSchema,
    /// The tested user may CREATE in the configured database (postgresql)
    CreatePrivilegeOnDatabase,
}

impl Check {
    /// Serialized name of the check.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::TableExists => "table_exists",
            Self::SchemaExists => "schema_exists",
            Self::SupportedVersion => "supported_version",
            Self::CreatePrivilegeOnSchema => "create_privilege_on_schema",
            Self::CreatePrivilegeOnDatabase => "create_privilege_on_database",
        }
    }

    /// The probe failure a false outcome of this check reports.
    ///
    /// Connectivity failures carry a finer reason in the result; this is the
    /// fallback when none was classified.
    pub const fn failure(self) -> ProbeError {
        match self {
            Self::Connectivity => ProbeError::ConnectionFailed,
            Self::TableExists => ProbeError::InvalidTable,
            Self::SchemaExists => ProbeError::InvalidSchema,
            Self::SupportedVersion => ProbeError::UnsupportedVersion,
            Self::CreatePrivilegeOnSchema => ProbeError::MissingSchemaPrivilege,
            Self::CreatePrivilegeOnDatabase => ProbeError::MissingDatabasePrivilege,
        }
    }

    /// Every check the probe runs for `kind`, in order, when nothing fails.
    pub fn plan(kind: DatabaseKind) -> Vec<Self> {
        let mut plan = vec![Self::Connectivity, Self::TableExists];
        if kind.requires_schema() {
            plan.push(Self::SchemaExists);
        }
        plan.push(Self::SupportedVersion);
        if kind.checks_create_privileges() {
            plan.push(Self::CreatePrivilegeOnSchema);
            plan.push(Self::CreatePrivilegeOnDatabase);
        }
        plan
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reasons a probe reports a source connection as unusable.
///
/// The display text is the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeError {
    /// Authentication was rejected
    #[error("Database server or credentials is invalid.")]
    InvalidCredentials,
    /// The server reports the target database as unknown
    #[error("Database does not exist.")]
    InvalidDatabase,
    /// The target table is not listed
    #[error("Database table does not exist.")]
    InvalidTable,
    /// The target schema is not listed
    #[error("Database schema does not exist.")]
    InvalidSchema,
    /// The server version is outside the support policy
    #[error("Database version is not supported.")]
    UnsupportedVersion,
    /// The tested user lacks CREATE on the schema
    #[error("User has no create privilege in schema.")]
    MissingSchemaPrivilege,
    /// The tested user lacks CREATE on the database
    #[error("User has no create privilege in database.")]
    MissingDatabasePrivilege,
    /// The server could not be reached or the connection failed otherwise
    #[error("Connectivity test failed.")]
    ConnectionFailed,
}

impl ProbeError {
    /// Stable machine-readable code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidDatabase => "invalid_database",
            Self::InvalidTable => "invalid_table",
            Self::InvalidSchema => "invalid_schema",
            Self::UnsupportedVersion => "unsupported_version",
            Self::MissingSchemaPrivilege => "missing_schema_privilege",
            Self::MissingDatabasePrivilege => "missing_database_privilege",
            Self::ConnectionFailed => "connection_failed",
        }
    }
}

/// Failure reporting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProbeMode {
    /// Run every reachable check and report all of them
    #[default]
    Collect,
    /// Stop at the first failing check
    FailFast,
}

impl ProbeMode {
    /// Whether the probe moves on to the next check after one with `passed`.
    pub const fn continues_after(self, passed: bool) -> bool {
        passed || matches!(self, Self::Collect)
    }
}

/// Outcome of one probe: the checks that were attempted, in order.
///
/// Checks that were not attempted are absent, never reported as passing.
/// `success()` is true only if at least one check ran and all of them passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    kind: DatabaseKind,
    checks: Vec<(Check, bool)>,
    connect_failure: Option<ProbeError>,
    server_version: Option<ServerVersion>,
}

impl ProbeResult {
    pub(super) const fn new(kind: DatabaseKind) -> Self {
        Self {
            kind,
            checks: Vec::new(),
            connect_failure: None,
            server_version: None,
        }
    }

    pub(super) fn record(&mut self, check: Check, passed: bool) {
        debug_assert!(self.get(check).is_none(), "check {check} recorded twice");
        self.checks.push((check, passed));
    }

    /// Records `check` and tells whether the probe should continue.
    pub(super) fn record_step(&mut self, check: Check, passed: bool, mode: ProbeMode) -> bool {
        self.record(check, passed);
        mode.continues_after(passed)
    }

    pub(super) fn record_connect_failure(&mut self, reason: ProbeError) {
        self.record(Check::Connectivity, false);
        self.connect_failure = Some(reason);
    }

    pub(super) const fn set_server_version(&mut self, version: ServerVersion) {
        self.server_version = Some(version);
    }

    /// Database kind that was probed.
    pub const fn kind(&self) -> DatabaseKind {
        self.kind
    }

    /// Attempted checks with their outcomes, in execution order.
    pub fn checks(&self) -> &[(Check, bool)] {
        &self.checks
    }

    /// Outcome of `check`, or `None` if it was not attempted.
    pub fn get(&self, check: Check) -> Option<bool> {
        self.checks
            .iter()
            .find_map(|(c, passed)| (*c == check).then_some(*passed))
    }

    /// True iff at least one check was attempted and all attempted checks passed.
    pub fn success(&self) -> bool {
        !self.checks.is_empty() && self.checks.iter().all(|(_, passed)| *passed)
    }

    /// Classified reason for a failed connectivity check.
    pub const fn connect_failure(&self) -> Option<ProbeError> {
        self.connect_failure
    }

    /// Parsed server version, when the version check ran.
    pub const fn server_version(&self) -> Option<ServerVersion> {
        self.server_version
    }

    /// Failure reasons of all failed checks, in execution order.
    pub fn failures(&self) -> Vec<ProbeError> {
        self.checks
            .iter()
            .filter(|(_, passed)| !passed)
            .map(|(check, _)| self.failure_of(*check))
            .collect()
    }

    /// Failure reason of the first failed check.
    pub fn first_failure(&self) -> Option<ProbeError> {
        self.checks
            .iter()
            .find(|(_, passed)| !passed)
            .map(|(check, _)| self.failure_of(*check))
    }

    fn failure_of(&self, check: Check) -> ProbeError {
        match check {
            Check::Connectivity => self.connect_failure.unwrap_or(ProbeError::ConnectionFailed),
            other => other.failure(),
        }
    }
}

impl Serialize for ProbeResult {
    /// Flat map of `check_name: bool` for attempted checks, then `success`,
    /// plus `connect_failure` / `server_version` when known.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        for (check, passed) in &self.checks {
            map.serialize_entry(check.name(), passed)?;
        }
        map.serialize_entry("success", &self.success())?;
        if let Some(reason) = self.connect_failure {
            map.serialize_entry("connect_failure", &reason)?;
        }
        if let Some(version) = self.server_version {
            map.serialize_entry("server_version", &version)?;
        }
        map.end()
    }
}
