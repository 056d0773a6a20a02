//! Administrative credentials used for privilege checks.
//!
//! Privilege catalogs are queried on behalf of the tested user with a
//! separate, trusted credential pair per database kind. The mapping is built
//! once at process start and shared read-only (`Arc<AdminCredentials>`)
//! between concurrent evaluations.

use crate::models::DatabaseKind;
use crate::security::Credentials;
use std::collections::BTreeMap;

/// Environment variable holding the MySQL administrative user.
pub const MYSQL_USER_VAR: &str = "MYSQL_USER";
/// Environment variable holding the MySQL administrative password.
pub const MYSQL_PASSWORD_VAR: &str = "MYSQL_PASSWORD";
/// Environment variable holding the PostgreSQL administrative user.
pub const POSTGRES_USER_VAR: &str = "POSTGRES_USER";
/// Environment variable holding the PostgreSQL administrative password.
pub const POSTGRES_PASSWORD_VAR: &str = "POSTGRES_PASSWORD";

/// Immutable mapping from database kind to administrative credentials.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AdminCredentials {
    by_kind: BTreeMap<DatabaseKind, Credentials>,
}

impl AdminCredentials {
    /// An empty mapping: privilege checks will fail closed.
    pub fn none() -> Self {
        Self::default()
    }

    /// Reads the mapping from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the mapping from an arbitrary variable lookup.
    ///
    /// A kind is configured when its user variable is set and non-blank; a
    /// missing password variable reads as an empty password.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut by_kind = BTreeMap::new();
        for kind in DatabaseKind::ALL {
            let (user_var, password_var) = env_vars_for(kind);
            let Some(user) = lookup(user_var).filter(|u| !u.trim().is_empty()) else {
                continue;
            };
            let password = lookup(password_var).unwrap_or_default();
            by_kind.insert(kind, Credentials::new(user, password));
        }
        Self { by_kind }
    }

    /// Builder method to set the credentials for one kind.
    pub fn with(mut self, kind: DatabaseKind, credentials: Credentials) -> Self {
        self.by_kind.insert(kind, credentials);
        self
    }

    /// Credentials for `kind`, if configured.
    pub fn for_kind(&self, kind: DatabaseKind) -> Option<&Credentials> {
        self.by_kind.get(&kind)
    }

    /// Kinds that have credentials configured.
    pub fn configured_kinds(&self) -> impl Iterator<Item = DatabaseKind> + '_ {
        self.by_kind.keys().copied()
    }
}

/// Names of the (user, password) environment variables for `kind`.
pub const fn env_vars_for(kind: DatabaseKind) -> (&'static str, &'static str) {
    match kind {
        DatabaseKind::MySql => (MYSQL_USER_VAR, MYSQL_PASSWORD_VAR),
        DatabaseKind::PostgreSql => (POSTGRES_USER_VAR, POSTGRES_PASSWORD_VAR),
    }
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("configured", &self.configured_kinds().collect::<Vec<_>>())
            .finish()
    }
}
