//! Unified error types for the hull workspace.
//!
//! Every library crate returns [`HullError`]. Teardown paths that must keep
//! going after a failure collect errors into [`Failures`] instead of
//! returning early.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum HullError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value or user input is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A kernel call (mount, namespace, netlink, ...) failed.
    #[error("kernel operation failed: {message}")]
    Kernel {
        /// Description of the failed operation.
        message: String,
    },

    /// An external program exited unsuccessfully or could not be spawned.
    #[error("{program} failed: {message}")]
    Command {
        /// Program that was invoked.
        program: String,
        /// Captured failure description.
        message: String,
    },

    /// No free address is left in a subnet.
    #[error("no free address left in subnet {subnet}")]
    Exhausted {
        /// Subnet in CIDR notation.
        subnet: String,
    },

    /// The requested operation is not allowed in the current state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the refused operation.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl HullError {
    /// Builds an [`HullError::Io`] from a path and an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds an [`HullError::Kernel`] from an operation label and its cause.
    pub fn kernel(op: &str, cause: impl std::fmt::Display) -> Self {
        Self::Kernel {
            message: format!("{op}: {cause}"),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, HullError>;

/// Non-fatal errors collected by a best-effort operation.
///
/// An empty list means every step succeeded.
pub type Failures = Vec<HullError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_message_names_subnet() {
        let err = HullError::Exhausted {
            subnet: "10.0.0.0/30".into(),
        };
        assert_eq!(err.to_string(), "no free address left in subnet 10.0.0.0/30");
    }

    #[test]
    fn kernel_helper_prefixes_operation() {
        let err = HullError::kernel("pivot_root", "EINVAL");
        assert_eq!(err.to_string(), "kernel operation failed: pivot_root: EINVAL");
    }
}
