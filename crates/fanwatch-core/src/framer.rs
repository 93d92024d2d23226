//! Framing of raw fanotify read buffers.
//!
//! A single `read(2)` on the channel returns back-to-back variable-length
//! records. Each starts with a fixed 24-byte header whose first field is
//! the record's total length. [`frame`] walks the buffer with an integer
//! cursor and yields one [`RawRecord`] per valid header, stopping at the
//! first header that is truncated or declares an impossible length.

use fanwatch_common::constants::{EVENT_METADATA_LEN, FANOTIFY_METADATA_VERSION, FAN_NOFD};
use fanwatch_common::types::EventMask;

/// One decoded `fanotify_event_metadata` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    /// Byte offset of the record inside the buffer it was framed from.
    pub offset: usize,
    /// Total record length, header included.
    pub event_len: u32,
    /// Metadata format version.
    pub version: u8,
    /// Reserved byte.
    pub reserved: u8,
    /// Length of the fixed header as reported by the kernel.
    pub metadata_len: u16,
    /// Event-type bits.
    pub mask: EventMask,
    /// Descriptor the kernel installed in this process for the file.
    pub fd: i32,
    /// PID of the process that caused the event.
    pub pid: i32,
}

impl RawRecord {
    /// Builds a header-only record at offset zero.
    #[must_use]
    pub fn new(mask: EventMask, fd: i32, pid: i32) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let header_len = EVENT_METADATA_LEN as u16;
        Self {
            offset: 0,
            event_len: u32::from(header_len),
            version: FANOTIFY_METADATA_VERSION,
            reserved: 0,
            metadata_len: header_len,
            mask,
            fd,
            pid,
        }
    }

    /// Returns `true` for the kernel's queue-overflow notification.
    #[must_use]
    pub const fn is_overflow(&self) -> bool {
        self.mask.is_overflow()
    }

    /// Returns `true` if the record carries a file descriptor.
    #[must_use]
    pub const fn has_fd(&self) -> bool {
        self.fd > FAN_NOFD
    }

    /// Serializes the header in native byte order, zero-padding up to
    /// `event_len`.
    ///
    /// Used to build synthetic streams for replay and tests.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let start = out.len();
        out.extend_from_slice(&self.event_len.to_ne_bytes());
        out.push(self.version);
        out.push(self.reserved);
        out.extend_from_slice(&self.metadata_len.to_ne_bytes());
        out.extend_from_slice(&self.mask.bits().to_ne_bytes());
        out.extend_from_slice(&self.fd.to_ne_bytes());
        out.extend_from_slice(&self.pid.to_ne_bytes());
        let declared = self.event_len as usize;
        if out.len() - start < declared {
            out.resize(start + declared, 0);
        }
    }

    fn decode(buf: &[u8], offset: usize) -> Self {
        let h = &buf[offset..offset + EVENT_METADATA_LEN];
        Self {
            offset,
            event_len: u32::from_ne_bytes([h[0], h[1], h[2], h[3]]),
            version: h[4],
            reserved: h[5],
            metadata_len: u16::from_ne_bytes([h[6], h[7]]),
            mask: EventMask::from_bits(u64::from_ne_bytes([
                h[8], h[9], h[10], h[11], h[12], h[13], h[14], h[15],
            ])),
            fd: i32::from_ne_bytes([h[16], h[17], h[18], h[19]]),
            pid: i32::from_ne_bytes([h[20], h[21], h[22], h[23]]),
        }
    }
}

/// Lazy iterator over the records of one read buffer.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    buf: &'a [u8],
    cursor: usize,
    done: bool,
}

impl Records<'_> {
    /// Bytes not consumed as records.
    ///
    /// Meaningful once the iterator is exhausted; a non-zero value is the
    /// truncated or malformed tail of the buffer.
    #[must_use]
    pub const fn remainder(&self) -> usize {
        self.buf.len() - self.cursor
    }
}

impl Iterator for Records<'_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        if self.done {
            return None;
        }
        let remaining = self.buf.len() - self.cursor;
        if remaining < EVENT_METADATA_LEN {
            self.done = true;
            return None;
        }
        let record = RawRecord::decode(self.buf, self.cursor);
        let len = record.event_len as usize;
        if len < EVENT_METADATA_LEN || len > remaining {
            self.done = true;
            return None;
        }
        self.cursor += len;
        Some(record)
    }
}

impl std::iter::FusedIterator for Records<'_> {}

/// Frames `buf` into records.
///
/// Every call starts a fresh cursor at offset zero, so framing the same
/// buffer twice yields the same sequence.
#[must_use]
pub const fn frame(buf: &[u8]) -> Records<'_> {
    Records {
        buf,
        cursor: 0,
        done: false,
    }
}
