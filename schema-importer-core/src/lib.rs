//! Core library for Schema Importer source connections.
//!
//! A source connection names an external MySQL or PostgreSQL table to import
//! from. This crate decides whether such a connection is usable: it checks
//! the config's required fields, probes the live server (connectivity, table,
//! schema, version, privileges), and reports which checks were attempted and
//! how each came out. Around that it offers persistence, read-only
//! introspection, and a service API with status-code error mapping.
//!
//! # Security Guarantees
//! - Source passwords are write-only: never serialized back, logged, or displayed
//! - Administrative credentials are used only for privilege catalog queries
//! - All probe and introspection queries are read-only
//! - Every connection a probe opens is closed before it returns
//!
//! # Architecture
//! - `validation` is a pure field-presence check
//! - `probe` runs the live checks through one `ProbeDriver` per database kind
//! - `orchestrator` composes the two under a collect or fail-fast policy
//! - `service` is the transport boundary over `store` and `introspection`

pub mod config;
pub mod error;
pub mod introspection;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod probe;
pub mod security;
pub mod service;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use config::{AdminCredentials, ConnectionConfig, ConnectionUpdate, ProbeSettings};
pub use error::{Result, SchemaImporterError};
pub use introspection::{Introspector, Introspectors, RowLimit};
pub use models::{ColumnInfo, DatabaseKind, ServerVersion};
pub use orchestrator::{ConnectionOrchestrator, EvaluationState, Failure, Outcome};
pub use probe::{Check, DatabaseProbe, ProbeError, ProbeMode, ProbeResult};
pub use service::{ErrorResponse, ServiceError, SourceConnectionService};
pub use store::{
    ConnectionStore, JsonFileStore, MemoryStore, PublicConnection, Replacement, StoredConnection,
};
pub use validation::{ValidationError, validate};
