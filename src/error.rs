//! Error taxonomy for the native provider.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing addresses or credentials that do not resolve.
    #[error("[{provider}] {message}")]
    Configuration { provider: String, message: String },

    #[error("[{provider}] does not support command: [{command}]")]
    UnsupportedOperation { provider: String, command: String },

    /// A phase marker or the committed cluster state could not be
    /// written, read or removed.
    #[error("failed to persist {what} for cluster {cluster}: {source}")]
    Persistence {
        cluster: String,
        what: String,
        #[source]
        source: std::io::Error,
    },

    /// Addresses that would corrupt durable membership if seeded.
    #[error("invalid node address {address:?}: {reason}")]
    Validation { address: String, reason: String },

    #[error("installer failed: {0}")]
    Installer(String),

    #[error("failed to encode cluster state: {0}")]
    Serialization(String),
}

impl Error {
    pub fn configuration(provider: &str, message: impl Into<String>) -> Self {
        Error::Configuration {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn validation(address: &str, reason: impl Into<String>) -> Self {
        Error::Validation {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// A node that could not be torn down during rollback. Reported to the
/// operator, never escalated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecommissionWarning {
    pub instance_id: String,
    pub message: String,
}

impl DecommissionWarning {
    pub fn new(instance_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DecommissionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decommission node {}: {}", self.instance_id, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_names_the_command() {
        let err = Error::UnsupportedOperation {
            provider: "native".into(),
            command: "delete".into(),
        };
        assert_eq!(err.to_string(), "[native] does not support command: [delete]");
    }

    #[test]
    fn warning_display() {
        let w = DecommissionWarning::new("1-2-3-4", "connection refused");
        assert_eq!(
            w.to_string(),
            "failed to decommission node 1-2-3-4: connection refused"
        );
    }
}
