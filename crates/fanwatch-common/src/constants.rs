//! Kernel ABI constants for the fanotify notification channel.
//!
//! Values mirror `<linux/fanotify.h>` and are defined here so the engine
//! builds against C libraries whose headers predate the newer flags.

/// File was accessed.
pub const FAN_ACCESS: u64 = 0x0000_0001;
/// File was modified.
pub const FAN_MODIFY: u64 = 0x0000_0002;
/// Writable file was closed.
pub const FAN_CLOSE_WRITE: u64 = 0x0000_0008;
/// Read-only file was closed.
pub const FAN_CLOSE_NOWRITE: u64 = 0x0000_0010;
/// File was opened.
pub const FAN_OPEN: u64 = 0x0000_0020;
/// File was moved from a watched location.
pub const FAN_MOVED_FROM: u64 = 0x0000_0040;
/// File was moved to a watched location.
pub const FAN_MOVED_TO: u64 = 0x0000_0080;
/// File was created.
pub const FAN_CREATE: u64 = 0x0000_0100;
/// File was deleted.
pub const FAN_DELETE: u64 = 0x0000_0200;
/// The kernel event queue overflowed and events were dropped.
pub const FAN_Q_OVERFLOW: u64 = 0x0000_4000;
/// Permission check on open.
pub const FAN_OPEN_PERM: u64 = 0x0001_0000;
/// Permission check on access.
pub const FAN_ACCESS_PERM: u64 = 0x0002_0000;
/// Children of a marked directory generate events.
pub const FAN_EVENT_ON_CHILD: u64 = 0x0800_0000;
/// The event occurred against a directory.
pub const FAN_ONDIR: u64 = 0x4000_0000;

/// Both close events.
pub const FAN_CLOSE: u64 = FAN_CLOSE_WRITE | FAN_CLOSE_NOWRITE;
/// Both move events.
pub const FAN_MOVE: u64 = FAN_MOVED_FROM | FAN_MOVED_TO;
/// Every permission event.
pub const FAN_ALL_PERM_EVENTS: u64 = FAN_OPEN_PERM | FAN_ACCESS_PERM;

/// Notification-only class: events are delivered after the fact.
pub const FAN_CLASS_NOTIF: u32 = 0x0000_0000;
/// Set close-on-exec on the channel descriptor.
pub const FAN_CLOEXEC: u32 = 0x0000_0001;

/// Add the mask to the mark.
pub const FAN_MARK_ADD: u32 = 0x0000_0001;
/// Mark the whole mount containing the path.
pub const FAN_MARK_MOUNT: u32 = 0x0000_0010;
/// Mark the whole filesystem containing the path.
pub const FAN_MARK_FILESYSTEM: u32 = 0x0000_0100;

/// Metadata format version this engine understands.
pub const FANOTIFY_METADATA_VERSION: u8 = 3;

/// Sentinel fd carried by records that have no file attached.
pub const FAN_NOFD: i32 = -1;

/// Size in bytes of one `fanotify_event_metadata` header.
pub const EVENT_METADATA_LEN: usize = 24;

/// Number of headers the default read buffer holds.
pub const DEFAULT_BUFFER_RECORDS: usize = 200;

/// Default size of the reusable read buffer.
pub const DEFAULT_BUFFER_SIZE: usize = DEFAULT_BUFFER_RECORDS * EVENT_METADATA_LEN;

/// Default path handed to the mark call.
pub const DEFAULT_WATCH_ROOT: &str = "/";

/// Default mount point of the proc filesystem.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Default sleep after a failed channel read, in milliseconds.
pub const DEFAULT_READ_RETRY_BACKOFF_MS: u64 = 10;

/// Name given to the background monitor thread.
pub const MONITOR_THREAD_NAME: &str = "fanwatch-monitor";
