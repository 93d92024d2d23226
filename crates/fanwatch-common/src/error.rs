//! Unified error types for the fanwatch workspace.
//!
//! Only failures a caller can act on are represented here. Truncated
//! buffer tails and failed fd/pid lookups are expected artifacts of
//! steady-state operation and are reported through counters and optional
//! fields instead.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum FanwatchError {
    /// Opening the notification channel or registering the watch failed.
    #[error("{operation} failed for {path}: {source}")]
    Acquisition {
        /// The kernel call that failed.
        operation: &'static str,
        /// Watch root the channel was being set up for.
        path: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Reading from the notification channel failed.
    #[error("channel read failed: {source}")]
    Read {
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The background monitor thread could not be created.
    #[error("failed to spawn monitor thread: {source}")]
    Spawn {
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl FanwatchError {
    /// Returns `true` if the error stems from missing privileges.
    ///
    /// Useful for hosts that want to print a hint about `CAP_SYS_ADMIN`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Acquisition { source, .. } | Self::Io { source, .. } => {
                source.kind() == std::io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, FanwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquisition_error_names_operation_and_path() {
        let err = FanwatchError::Acquisition {
            operation: "fanotify_init",
            path: PathBuf::from("/"),
            source: std::io::Error::from_raw_os_error(1),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("fanotify_init failed for /"));
        assert!(err.is_permission_denied());
    }

    #[test]
    fn config_error_is_not_permission_denied() {
        let err = FanwatchError::Config {
            message: "empty mask".into(),
        };
        assert!(!err.is_permission_denied());
        assert_eq!(err.to_string(), "invalid configuration: empty mask");
    }
}
