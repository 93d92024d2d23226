//! Domain value types exchanged between the engine and its host.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{FanwatchError, Result};

/// Set of fanotify event-type flags carried by a record or a watch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMask(u64);

/// Human-readable flag names, in bit order.
const FLAG_NAMES: &[(u64, &str)] = &[
    (constants::FAN_ACCESS, "access"),
    (constants::FAN_MODIFY, "modify"),
    (constants::FAN_CLOSE_WRITE, "close-write"),
    (constants::FAN_CLOSE_NOWRITE, "close-nowrite"),
    (constants::FAN_OPEN, "open"),
    (constants::FAN_MOVED_FROM, "moved-from"),
    (constants::FAN_MOVED_TO, "moved-to"),
    (constants::FAN_CREATE, "create"),
    (constants::FAN_DELETE, "delete"),
    (constants::FAN_Q_OVERFLOW, "queue-overflow"),
    (constants::FAN_OPEN_PERM, "open-perm"),
    (constants::FAN_ACCESS_PERM, "access-perm"),
    (constants::FAN_EVENT_ON_CHILD, "event-on-child"),
    (constants::FAN_ONDIR, "ondir"),
];

impl EventMask {
    /// File was opened.
    pub const OPEN: Self = Self(constants::FAN_OPEN);
    /// File was accessed.
    pub const ACCESS: Self = Self(constants::FAN_ACCESS);
    /// File was modified.
    pub const MODIFY: Self = Self(constants::FAN_MODIFY);
    /// Writable file was closed.
    pub const CLOSE_WRITE: Self = Self(constants::FAN_CLOSE_WRITE);
    /// Read-only file was closed.
    pub const CLOSE_NOWRITE: Self = Self(constants::FAN_CLOSE_NOWRITE);
    /// File was created.
    pub const CREATE: Self = Self(constants::FAN_CREATE);
    /// File was deleted.
    pub const DELETE: Self = Self(constants::FAN_DELETE);
    /// File was moved away.
    pub const MOVED_FROM: Self = Self(constants::FAN_MOVED_FROM);
    /// File was moved in.
    pub const MOVED_TO: Self = Self(constants::FAN_MOVED_TO);
    /// Kernel queue overflowed.
    pub const QUEUE_OVERFLOW: Self = Self(constants::FAN_Q_OVERFLOW);
    /// Permission check on open.
    pub const OPEN_PERM: Self = Self(constants::FAN_OPEN_PERM);
    /// Permission check on access.
    pub const ACCESS_PERM: Self = Self(constants::FAN_ACCESS_PERM);
    /// Event concerns a directory.
    pub const ONDIR: Self = Self(constants::FAN_ONDIR);
    /// Children of a marked directory report events.
    pub const EVENT_ON_CHILD: Self = Self(constants::FAN_EVENT_ON_CHILD);

    /// The watch set used when nothing else is configured.
    pub const DEFAULT_WATCH: Self = Self(
        constants::FAN_OPEN
            | constants::FAN_ACCESS
            | constants::FAN_MODIFY
            | constants::FAN_CLOSE_WRITE
            | constants::FAN_DELETE,
    );

    /// Wraps raw kernel bits.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw kernel bits.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns `true` when no flag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every flag of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any flag of `other` is set in `self`.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns the union of both sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `self` with the flags of `other` cleared.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Returns `true` for the kernel's queue-overflow notification.
    #[must_use]
    pub const fn is_overflow(self) -> bool {
        self.intersects(Self::QUEUE_OVERFLOW)
    }

    /// Looks up a single flag by its kebab-case name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase().replace('_', "-");
        match name.as_str() {
            "close" => return Some(Self(constants::FAN_CLOSE)),
            "move" => return Some(Self(constants::FAN_MOVE)),
            _ => {}
        }
        FLAG_NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(bit, _)| Self(*bit))
    }

    /// Iterates over the names of the set flags in bit order.
    ///
    /// Bits without a known name are skipped.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        FLAG_NAMES
            .iter()
            .filter(move |(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| *name)
    }

    fn unknown_bits(self) -> u64 {
        let known = FLAG_NAMES.iter().fold(0, |acc, (bit, _)| acc | bit);
        self.0 & !known
    }
}

impl std::ops::BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromStr for EventMask {
    type Err = FanwatchError;

    /// Parses a comma-separated list such as `open,modify,close-write`.
    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .try_fold(Self::default(), |acc, part| {
                Self::from_name(part)
                    .map(|flag| acc | flag)
                    .ok_or_else(|| FanwatchError::Config {
                        message: format!("unknown event type: {}", part.trim()),
                    })
            })
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NONE");
        }
        let mut first = true;
        for name in self.names() {
            if !first {
                write!(f, "|")?;
            }
            first = false;
            write!(f, "{}", name.to_ascii_uppercase().replace('-', "_"))?;
        }
        let unknown = self.unknown_bits();
        if unknown != 0 {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{unknown:#x}")?;
        }
        Ok(())
    }
}

/// One decoded and enriched filesystem event, as handed to the sink.
///
/// `None` in an optional field means the lookup failed; `Some("")` means
/// it succeeded and the value really is empty (a kernel thread has an
/// empty command line, for example).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedEvent {
    /// PID of the process that triggered the event.
    pub pid: i32,
    /// First command-line word of the triggering process.
    pub process_name: Option<String>,
    /// Absolute path of the affected file.
    pub path: Option<PathBuf>,
    /// Raw event-type bits as delivered by the kernel.
    pub mask: EventMask,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_watch_covers_expected_flags() {
        let mask = EventMask::DEFAULT_WATCH;
        assert!(mask.contains(EventMask::OPEN));
        assert!(mask.contains(EventMask::ACCESS));
        assert!(mask.contains(EventMask::MODIFY));
        assert!(mask.contains(EventMask::CLOSE_WRITE));
        assert!(mask.contains(EventMask::DELETE));
        assert!(!mask.contains(EventMask::CLOSE_NOWRITE));
        assert_eq!(mask.bits(), 0x22b);
    }

    #[test]
    fn overflow_is_detected_alongside_other_bits() {
        assert!(EventMask::QUEUE_OVERFLOW.is_overflow());
        assert!((EventMask::QUEUE_OVERFLOW | EventMask::ONDIR).is_overflow());
        assert!(!EventMask::OPEN.is_overflow());
    }

    #[test]
    fn parses_comma_separated_names() {
        let mask: EventMask = "open, modify,close_write".parse().expect("parse");
        assert_eq!(
            mask,
            EventMask::OPEN | EventMask::MODIFY | EventMask::CLOSE_WRITE
        );
    }

    #[test]
    fn parses_group_aliases() {
        let mask: EventMask = "close,move".parse().expect("parse");
        assert!(mask.contains(EventMask::CLOSE_WRITE | EventMask::CLOSE_NOWRITE));
        assert!(mask.contains(EventMask::MOVED_FROM | EventMask::MOVED_TO));
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "open,teleport".parse::<EventMask>().unwrap_err();
        assert!(err.to_string().contains("teleport"));
    }

    #[test]
    fn display_lists_flags_and_unknown_bits() {
        assert_eq!((EventMask::OPEN | EventMask::MODIFY).to_string(), "MODIFY|OPEN");
        assert_eq!(EventMask::default().to_string(), "NONE");
        assert_eq!(
            EventMask::from_bits(constants::FAN_DELETE | 0x1_0000_0000).to_string(),
            "DELETE|0x100000000"
        );
    }

    #[test]
    fn difference_clears_flags() {
        let mask = EventMask::DEFAULT_WATCH.difference(EventMask::ACCESS);
        assert!(!mask.contains(EventMask::ACCESS));
        assert!(mask.contains(EventMask::OPEN));
    }

    #[test]
    fn enriched_event_serializes_unresolved_fields_as_null() {
        let event = EnrichedEvent {
            pid: 42,
            process_name: Some(String::new()),
            path: None,
            mask: EventMask::OPEN,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["pid"], 42);
        assert_eq!(json["process_name"], "");
        assert!(json["path"].is_null());
        assert_eq!(json["mask"], 0x20);
    }
}
