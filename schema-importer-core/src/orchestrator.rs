//! Validation plus probe, under one failure reporting policy.
//!
//! Every evaluation walks the same states:
//!
//! ```text
//! Unvalidated -> StructurallyValid -> ConnectivityChecked
//!     -> [TableChecked -> SchemaChecked ->] VersionChecked
//!     -> [PrivilegesChecked ->] Complete
//! ```
//!
//! or ends in `Failed(reason)`. A structurally invalid config never reaches
//! the probe, whatever the mode.

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::probe::{Check, DatabaseProbe, ProbeError, ProbeMode, ProbeResult};
use crate::validation::{ValidationError, validate};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// First reason an evaluation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(untagged)]
pub enum Failure {
    /// The config is missing a required field
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A live check failed
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

impl Failure {
    /// Stable machine-readable code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::Probe(e) => e.code(),
        }
    }
}

/// Where an evaluation is, or where it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationState {
    /// Nothing checked yet
    Unvalidated,
    /// Required fields are present
    StructurallyValid,
    /// The connectivity check ran
    ConnectivityChecked,
    /// The table check ran
    TableChecked,
    /// The schema check ran (postgresql)
    SchemaChecked,
    /// The version check ran
    VersionChecked,
    /// Both privilege checks ran (postgresql)
    PrivilegesChecked,
    /// Evaluation finished with a result
    Complete,
    /// Evaluation stopped at the first failure
    Failed(Failure),
}

impl EvaluationState {
    /// State reached once `check` has run, if it completes a stage.
    const fn after(check: Check) -> Option<Self> {
        match check {
            Check::Connectivity => Some(Self::ConnectivityChecked),
            Check::TableExists => Some(Self::TableChecked),
            Check::SchemaExists => Some(Self::SchemaChecked),
            Check::SupportedVersion => Some(Self::VersionChecked),
            Check::CreatePrivilegeOnSchema => None,
            Check::CreatePrivilegeOnDatabase => Some(Self::PrivilegesChecked),
        }
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every reachable check ran (collect mode) or all of them passed
    Completed(ProbeResult),
    /// The first failure (always for invalid configs, otherwise fail-fast)
    Failed(Failure),
}

impl Outcome {
    /// Terminal state of the evaluation.
    pub const fn state(&self) -> EvaluationState {
        match self {
            Self::Completed(_) => EvaluationState::Complete,
            Self::Failed(failure) => EvaluationState::Failed(*failure),
        }
    }

    /// The probe result, when the evaluation completed.
    pub const fn result(&self) -> Option<&ProbeResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Failed(_) => None,
        }
    }

    /// True when the evaluation completed and every attempted check passed.
    pub fn is_success(&self) -> bool {
        self.result().is_some_and(ProbeResult::success)
    }
}

/// Composes structural validation and the live probe.
#[derive(Debug, Clone)]
pub struct ConnectionOrchestrator {
    probe: DatabaseProbe,
}

impl ConnectionOrchestrator {
    /// Creates an orchestrator over `probe`.
    pub const fn new(probe: DatabaseProbe) -> Self {
        Self { probe }
    }

    /// The underlying probe.
    pub const fn probe(&self) -> &DatabaseProbe {
        &self.probe
    }

    /// Validates `config`, then probes it according to `mode`.
    ///
    /// # Errors
    /// Only fatal conditions propagate, such as a database kind with no
    /// driver compiled in.
    pub async fn evaluate(&self, config: &ConnectionConfig, mode: ProbeMode) -> Result<Outcome> {
        let mut state = EvaluationState::Unvalidated;

        if let Err(e) = validate(config) {
            let failed = EvaluationState::Failed(e.into());
            trace_transition(state, failed);
            return Ok(Outcome::Failed(e.into()));
        }
        state = advance(state, EvaluationState::StructurallyValid);

        let result = self.probe.probe(config, mode).await?;

        for (check, passed) in result.checks() {
            if !passed && mode == ProbeMode::FailFast {
                break;
            }
            if let Some(next) = EvaluationState::after(*check) {
                state = advance(state, next);
            }
        }

        let outcome = match (mode, result.first_failure()) {
            (ProbeMode::FailFast, Some(reason)) => Outcome::Failed(Failure::Probe(reason)),
            _ => Outcome::Completed(result),
        };
        trace_transition(state, outcome.state());
        Ok(outcome)
    }
}

fn advance(from: EvaluationState, to: EvaluationState) -> EvaluationState {
    trace_transition(from, to);
    to
}

fn trace_transition(from: EvaluationState, to: EvaluationState) {
    debug!("Evaluation state {:?} -> {:?}", from, to);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{AdminCredentials, ProbeSettings};
    use crate::models::DatabaseKind;
    use std::sync::Arc;

    fn orchestrator() -> ConnectionOrchestrator {
        ConnectionOrchestrator::new(DatabaseProbe::without_drivers(
            Arc::new(AdminCredentials::none()),
            ProbeSettings::default(),
        ))
    }

    #[tokio::test]
    async fn test_invalid_config_fails_in_both_modes() {
        let config = ConnectionConfig::new(DatabaseKind::PostgreSql, "localhost").with_table("t");
        for mode in [ProbeMode::Collect, ProbeMode::FailFast] {
            let outcome = orchestrator().evaluate(&config, mode).await.unwrap();
            assert_eq!(
                outcome,
                Outcome::Failed(Failure::Validation(ValidationError::SchemaRequired))
            );
            assert_eq!(
                outcome.state(),
                EvaluationState::Failed(Failure::Validation(ValidationError::SchemaRequired))
            );
            assert!(!outcome.is_success());
        }
    }

    #[tokio::test]
    async fn test_missing_driver_is_fatal() {
        let config = ConnectionConfig::new(DatabaseKind::MySql, "localhost").with_table("orders");
        let err = orchestrator()
            .evaluate(&config, ProbeMode::Collect)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection probe"));
    }

    #[test]
    fn test_failure_messages_pass_through() {
        assert_eq!(
            Failure::from(ValidationError::TableRequired).to_string(),
            "Table name is required."
        );
        assert_eq!(
            Failure::from(ProbeError::InvalidSchema).to_string(),
            "Database schema does not exist."
        );
        assert_eq!(
            Failure::from(ProbeError::InvalidTable).code(),
            "invalid_table"
        );
    }
}
