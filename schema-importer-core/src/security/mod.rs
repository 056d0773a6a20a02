//! Security utilities for credential protection.
//!
//! # Security Guarantees
//! - Passwords are stored in `Zeroizing` containers for automatic memory clearing
//! - Passwords cannot be serialized and are masked in `Debug` output
//! - Connection URLs are redacted before they reach logs or error messages
//!
//! # Module Structure
//! - `credentials`: `Password` and `Credentials` containers

mod credentials;

pub use credentials::{Credentials, Password};
