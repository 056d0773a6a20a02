//! Probe timing settings.

use std::time::Duration;

/// Timeouts applied by the probe and the introspectors.
///
/// These bound single network round-trips; they are not a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Upper bound on opening one connection
    pub connect_timeout: Duration,
    /// Upper bound on one catalog query
    pub query_timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(30),
        }
    }
}

impl ProbeSettings {
    /// Builder method to set the connect timeout.
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder method to set the query timeout.
    pub const fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    /// Returns error if a timeout is zero
    pub fn validate(&self) -> crate::Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(crate::error::SchemaImporterError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if self.query_timeout.is_zero() {
            return Err(crate::error::SchemaImporterError::configuration(
                "query_timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = ProbeSettings::default();
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let settings = ProbeSettings::default().with_connect_timeout(Duration::ZERO);
        assert!(settings.validate().is_err());

        let settings = ProbeSettings::default().with_query_timeout(Duration::ZERO);
        assert!(settings.validate().is_err());
    }
}
