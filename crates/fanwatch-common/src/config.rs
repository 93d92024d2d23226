//! Configuration model for a monitor instance.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{FanwatchError, Result};
use crate::types::EventMask;

/// How much of the filesystem a watch registration covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchScope {
    /// The entire mount containing the watch root.
    #[default]
    Mount,
    /// The entire filesystem containing the watch root.
    Filesystem,
    /// The watch root directory and its direct children only.
    Directory,
}

/// What dropping a running monitor does with its background thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownMode {
    /// Signal the loop and return immediately.
    #[default]
    Detach,
    /// Signal the loop and wait for it to release the channel.
    Join,
}

/// Root configuration for a monitor instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Path handed to the mark call.
    pub watch_root: PathBuf,
    /// Extent of the watch registration.
    pub scope: WatchScope,
    /// Event types to report.
    pub event_mask: EventMask,
    /// Size in bytes of the reusable read buffer.
    pub buffer_size: usize,
    /// Sleep after a failed read before polling again.
    pub read_retry_backoff_ms: u64,
    /// Behavior of the background thread when the monitor is dropped.
    pub shutdown: ShutdownMode,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            watch_root: PathBuf::from(constants::DEFAULT_WATCH_ROOT),
            scope: WatchScope::default(),
            event_mask: EventMask::DEFAULT_WATCH,
            buffer_size: constants::DEFAULT_BUFFER_SIZE,
            read_retry_backoff_ms: constants::DEFAULT_READ_RETRY_BACKOFF_MS,
            shutdown: ShutdownMode::default(),
        }
    }
}

impl MonitorConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// Missing fields take their default values. The result is validated
    /// before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON,
    /// or describes an invalid configuration.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| FanwatchError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the kernel channel cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`FanwatchError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size < constants::EVENT_METADATA_LEN {
            return Err(FanwatchError::Config {
                message: format!(
                    "buffer_size {} is smaller than one event header ({} bytes)",
                    self.buffer_size,
                    constants::EVENT_METADATA_LEN
                ),
            });
        }
        if self.event_mask.is_empty() {
            return Err(FanwatchError::Config {
                message: "event_mask selects no events".into(),
            });
        }
        if self
            .event_mask
            .intersects(EventMask::from_bits(constants::FAN_ALL_PERM_EVENTS))
        {
            return Err(FanwatchError::Config {
                message: "permission events require a content-class channel".into(),
            });
        }
        if self.event_mask.is_overflow() {
            return Err(FanwatchError::Config {
                message: "queue-overflow is always reported and cannot be requested".into(),
            });
        }
        if self.watch_root.as_os_str().is_empty() {
            return Err(FanwatchError::Config {
                message: "watch_root is empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MonitorConfig::default();
        config.validate().expect("default should validate");
        assert_eq!(config.watch_root, PathBuf::from("/"));
        assert_eq!(config.scope, WatchScope::Mount);
        assert_eq!(config.buffer_size, 4800);
        assert_eq!(config.shutdown, ShutdownMode::Detach);
    }

    #[test]
    fn rejects_buffer_smaller_than_header() {
        let config = MonitorConfig {
            buffer_size: 23,
            ..MonitorConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("buffer_size 23"));
    }

    #[test]
    fn accepts_buffer_of_exactly_one_header() {
        let config = MonitorConfig {
            buffer_size: constants::EVENT_METADATA_LEN,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_and_permission_masks() {
        let empty = MonitorConfig {
            event_mask: EventMask::default(),
            ..MonitorConfig::default()
        };
        assert!(empty.validate().is_err());

        let perm = MonitorConfig {
            event_mask: EventMask::OPEN | EventMask::OPEN_PERM,
            ..MonitorConfig::default()
        };
        assert!(perm.validate().is_err());

        let overflow = MonitorConfig {
            event_mask: EventMask::QUEUE_OVERFLOW,
            ..MonitorConfig::default()
        };
        assert!(overflow.validate().is_err());
    }

    #[test]
    fn loads_partial_json_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{ "watch_root": "/home", "scope": "directory", "event_mask": 2, "shutdown": "join" }}"#
        )
        .expect("write");

        let config = MonitorConfig::from_json_file(file.path()).expect("load");
        assert_eq!(config.watch_root, PathBuf::from("/home"));
        assert_eq!(config.scope, WatchScope::Directory);
        assert_eq!(config.event_mask, EventMask::MODIFY);
        assert_eq!(config.shutdown, ShutdownMode::Join);
        assert_eq!(config.buffer_size, constants::DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.json");
        let err = MonitorConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, FanwatchError::Io { .. }));
    }

    #[test]
    fn invalid_json_is_a_serialization_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "{{ not json").expect("write");
        let err = MonitorConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, FanwatchError::Serialization { .. }));
    }
}
