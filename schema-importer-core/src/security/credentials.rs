//! Secret containers with automatic memory zeroing.
//!
//! # Security
//! - Secrets are stored in `Zeroizing<T>` containers
//! - Memory is cleared when the container goes out of scope
//! - Passwords are never exposed in debug output or logs
//! - `Password` implements `Deserialize` but deliberately not `Serialize`

use serde::{Deserialize, Deserializer};
use zeroize::Zeroizing;

/// A write-only password.
///
/// It can be read from input (deserialization, CLI, environment) and handed
/// to a database driver through [`Password::expose`], but it has no
/// `Serialize` implementation and its `Debug` output is masked.
#[derive(Clone, Default)]
pub struct Password(Zeroizing<String>);

impl Password {
    /// Wraps a plaintext password.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Returns the plaintext for handing to a driver. Never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the password is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(****)")
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Password {}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Username/password pair with automatic memory zeroing.
///
/// # Example
///
/// ```rust
/// use schema_importer_core::security::Credentials;
///
/// let creds = Credentials::new("admin", "secret");
/// assert_eq!(creds.username(), "admin");
/// assert!(creds.has_password());
/// assert!(!format!("{:?}", creds).contains("secret"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: Zeroizing<String>,
    password: Password,
}

impl Credentials {
    /// Creates new credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Zeroizing::new(username.into()),
            password: Password::new(password),
        }
    }

    /// Creates credentials from an already wrapped password.
    pub fn with_password(username: impl Into<String>, password: Password) -> Self {
        Self {
            username: Zeroizing::new(username.into()),
            password,
        }
    }

    /// Gets the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Gets the password.
    pub fn password(&self) -> &Password {
        &self.password
    }

    /// Checks if a non-empty password is present without exposing it.
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username())
            .field("password", &self.password)
            .finish()
    }
}
