//! Ownership of the kernel notification channel.
//!
//! [`FanotifyChannel`] wraps the descriptor returned by `fanotify_init(2)`
//! and the watch registered with `fanotify_mark(2)`. The descriptor is an
//! [`OwnedFd`], so it is closed exactly once whether the channel is
//! released explicitly or simply dropped.

use std::ffi::CString;
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use fanwatch_common::config::{MonitorConfig, WatchScope};
use fanwatch_common::constants::{
    FAN_CLASS_NOTIF, FAN_CLOEXEC, FAN_EVENT_ON_CHILD, FAN_MARK_ADD, FAN_MARK_FILESYSTEM,
    FAN_MARK_MOUNT,
};
use fanwatch_common::error::{FanwatchError, Result};

/// A readable stream of raw fanotify records.
///
/// Implemented by the real kernel channel and by in-memory sources used
/// for replay and tests. The monitor loop owns its source exclusively.
pub trait EventSource: Send {
    /// Blocks until records are available and copies them into `buf`.
    ///
    /// `Ok(0)` means nothing was read; the caller polls again.
    ///
    /// # Errors
    ///
    /// Returns [`FanwatchError::Read`] if the underlying read fails.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Opens an [`EventSource`] for a configuration.
///
/// The monitor calls this once per transition from idle to running.
pub trait ChannelOpener: Send + Sync {
    /// Acquires a source watching what `config` describes.
    ///
    /// # Errors
    ///
    /// Returns [`FanwatchError::Acquisition`] if the channel cannot be
    /// opened or the watch cannot be registered.
    fn open(&self, config: &MonitorConfig) -> Result<Box<dyn EventSource>>;
}

impl<F> ChannelOpener for F
where
    F: Fn(&MonitorConfig) -> Result<Box<dyn EventSource>> + Send + Sync,
{
    fn open(&self, config: &MonitorConfig) -> Result<Box<dyn EventSource>> {
        self(config)
    }
}

/// Opens real fanotify channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanotifyOpener;

impl ChannelOpener for FanotifyOpener {
    fn open(&self, config: &MonitorConfig) -> Result<Box<dyn EventSource>> {
        Ok(Box::new(FanotifyChannel::acquire(config)?))
    }
}

/// The open notification channel.
#[derive(Debug)]
pub struct FanotifyChannel {
    fd: Option<OwnedFd>,
}

impl FanotifyChannel {
    /// Opens a notification-class channel and registers the watch.
    ///
    /// Requires `CAP_SYS_ADMIN`. If the mark call fails the freshly opened
    /// descriptor is closed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`FanwatchError::Acquisition`] naming the failing call.
    #[allow(unsafe_code)]
    pub fn acquire(config: &MonitorConfig) -> Result<Self> {
        let acquisition_error = |operation: &'static str, source: std::io::Error| {
            FanwatchError::Acquisition {
                operation,
                path: config.watch_root.clone(),
                source,
            }
        };

        #[allow(clippy::cast_sign_loss)]
        let event_f_flags = (libc::O_RDONLY | libc::O_LARGEFILE) as libc::c_uint;
        // SAFETY: fanotify_init takes no pointers; the returned value is
        // either -1 or a new descriptor owned by nobody else.
        let raw = unsafe { libc::fanotify_init(FAN_CLASS_NOTIF | FAN_CLOEXEC, event_f_flags) };
        if raw < 0 {
            return Err(acquisition_error(
                "fanotify_init",
                std::io::Error::last_os_error(),
            ));
        }
        // SAFETY: raw was just returned by fanotify_init and is not shared.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let (mark_flags, mask) = mark_arguments(config);
        let path = c_path(&config.watch_root)
            .map_err(|e| acquisition_error("fanotify_mark", e))?;
        // SAFETY: fd is open, path is a valid NUL-terminated string that
        // outlives the call.
        let rc = unsafe {
            libc::fanotify_mark(
                fd.as_raw_fd(),
                mark_flags,
                mask,
                libc::AT_FDCWD,
                path.as_ptr(),
            )
        };
        if rc != 0 {
            return Err(acquisition_error(
                "fanotify_mark",
                std::io::Error::last_os_error(),
            ));
        }

        tracing::info!(
            root = %config.watch_root.display(),
            scope = ?config.scope,
            mask = %config.event_mask,
            "fanotify channel acquired"
        );
        Ok(Self { fd: Some(fd) })
    }

    /// Closes the channel. Calling it again is a no-op.
    pub fn release(&mut self) {
        if let Some(fd) = self.fd.take() {
            tracing::debug!(fd = fd.as_raw_fd(), "releasing fanotify channel");
            drop(fd);
        }
    }

    /// Returns `true` while the channel descriptor is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.fd.is_some()
    }
}

impl EventSource for FanotifyChannel {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(fd) = self.fd.as_ref() else {
            return Err(FanwatchError::Read {
                source: std::io::Error::from_raw_os_error(libc::EBADF),
            });
        };
        nix::unistd::read(fd.as_fd(), buf).map_err(|errno| FanwatchError::Read {
            source: std::io::Error::from(errno),
        })
    }
}

impl Drop for FanotifyChannel {
    fn drop(&mut self) {
        self.release();
    }
}

/// Computes the `fanotify_mark(2)` flags and mask for a configuration.
#[must_use]
pub const fn mark_arguments(config: &MonitorConfig) -> (libc::c_uint, u64) {
    let mask = config.event_mask.bits();
    match config.scope {
        WatchScope::Mount => (FAN_MARK_ADD | FAN_MARK_MOUNT, mask),
        WatchScope::Filesystem => (FAN_MARK_ADD | FAN_MARK_FILESYSTEM, mask),
        WatchScope::Directory => (FAN_MARK_ADD, mask | FAN_EVENT_ON_CHILD),
    }
}

fn c_path(path: &Path) -> std::io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use fanwatch_common::types::EventMask;

    use super::*;

    #[test]
    fn mount_scope_marks_whole_mount() {
        let config = MonitorConfig::default();
        let (flags, mask) = mark_arguments(&config);
        assert_eq!(flags, FAN_MARK_ADD | FAN_MARK_MOUNT);
        assert_eq!(mask, EventMask::DEFAULT_WATCH.bits());
    }

    #[test]
    fn filesystem_scope_marks_filesystem() {
        let config = MonitorConfig {
            scope: WatchScope::Filesystem,
            ..MonitorConfig::default()
        };
        let (flags, _) = mark_arguments(&config);
        assert_eq!(flags, FAN_MARK_ADD | FAN_MARK_FILESYSTEM);
    }

    #[test]
    fn directory_scope_adds_child_events() {
        let config = MonitorConfig {
            scope: WatchScope::Directory,
            event_mask: EventMask::MODIFY,
            ..MonitorConfig::default()
        };
        let (flags, mask) = mark_arguments(&config);
        assert_eq!(flags, FAN_MARK_ADD);
        assert_eq!(mask, EventMask::MODIFY.bits() | FAN_EVENT_ON_CHILD);
    }

    #[test]
    fn path_with_interior_nul_is_rejected() {
        let err = c_path(&PathBuf::from("/tmp/a\0b")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn acquire_either_succeeds_or_names_the_failing_call() {
        let config = MonitorConfig {
            watch_root: std::env::temp_dir(),
            ..MonitorConfig::default()
        };
        match FanotifyChannel::acquire(&config) {
            Ok(mut channel) => {
                assert!(channel.is_open());
                channel.release();
                channel.release();
                assert!(!channel.is_open());
            }
            Err(FanwatchError::Acquisition { operation, .. }) => {
                assert!(operation == "fanotify_init" || operation == "fanotify_mark");
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn read_after_release_is_an_error() {
        let mut channel = FanotifyChannel { fd: None };
        let mut buf = [0u8; 64];
        assert!(matches!(
            channel.read_into(&mut buf),
            Err(FanwatchError::Read { .. })
        ));
    }
}
