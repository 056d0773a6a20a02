//! Configuration types.
//!
//! - `ConnectionConfig` / `ConnectionUpdate`: a source connection and partial updates to it
//! - `AdminCredentials`: per-kind administrative credentials for privilege checks
//! - `ProbeSettings`: connect and query timeouts

pub mod admin;
mod connection;
mod probe;

pub use admin::AdminCredentials;
pub use connection::{ConnectionConfig, ConnectionUpdate};
pub use probe::ProbeSettings;
