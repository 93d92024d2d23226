//! Enrichment of framed records.
//!
//! Turns the opaque `fd` and `pid` of a [`RawRecord`] into a path and a
//! process name. Every lookup is best-effort: a failure leaves the field
//! as `None` and the event is still produced.
//!
//! The kernel duplicates a descriptor into this process for every
//! non-overflow record. [`Enricher::enrich`] takes ownership of it and
//! closes it exactly once, after the path lookup, whatever the outcome.

use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::path::PathBuf;
use std::sync::Arc;

use fanwatch_common::constants::DEFAULT_PROC_ROOT;
use fanwatch_common::types::EnrichedEvent;

use crate::framer::RawRecord;

/// Source of fd and pid lookups.
pub trait Resolver: Send + Sync {
    /// Resolves a descriptor of this process to the path it refers to.
    fn fd_path(&self, fd: RawFd) -> Option<PathBuf>;

    /// Resolves a PID to the first word of its command line.
    fn process_name(&self, pid: i32) -> Option<String>;
}

/// Resolver backed by the proc filesystem.
#[derive(Debug, Clone)]
pub struct ProcfsResolver {
    proc_root: PathBuf,
}

impl ProcfsResolver {
    /// Creates a resolver reading from the given proc mount point.
    #[must_use]
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }
}

impl Default for ProcfsResolver {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl Resolver for ProcfsResolver {
    fn fd_path(&self, fd: RawFd) -> Option<PathBuf> {
        let link = self.proc_root.join("self").join("fd").join(fd.to_string());
        std::fs::read_link(&link)
            .inspect_err(|e| tracing::trace!(fd, error = %e, "fd path lookup failed"))
            .ok()
    }

    fn process_name(&self, pid: i32) -> Option<String> {
        if pid <= 0 {
            return None;
        }
        let cmdline = self.proc_root.join(pid.to_string()).join("cmdline");
        let bytes = std::fs::read(&cmdline)
            .inspect_err(|e| tracing::trace!(pid, error = %e, "process name lookup failed"))
            .ok()?;
        Some(first_cmdline_word(&bytes))
    }
}

/// Extracts argv[0] from a raw `/proc/<pid>/cmdline` buffer.
fn first_cmdline_word(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .position(|&b| b == 0 || b == b'\n')
        .unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Resolves records into [`EnrichedEvent`]s.
#[derive(Clone)]
pub struct Enricher {
    resolver: Arc<dyn Resolver>,
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher").finish_non_exhaustive()
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(Arc::new(ProcfsResolver::default()))
    }
}

impl Enricher {
    /// Creates an enricher using the given resolver.
    #[must_use]
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// Enriches one record, consuming the descriptor it carries.
    ///
    /// Returns `None` for queue-overflow records, which are neither
    /// resolved nor closed. Records carrying the "no fd" sentinel get a
    /// `None` path and nothing is closed.
    ///
    /// The record's descriptor must have been delivered by the kernel to
    /// this process and not be used or closed anywhere else; each record
    /// may be enriched at most once.
    #[allow(unsafe_code)]
    pub fn enrich(&self, record: &RawRecord) -> Option<EnrichedEvent> {
        if record.is_overflow() {
            return None;
        }

        let path = if record.has_fd() {
            // SAFETY: the kernel installed this descriptor in our table for
            // this record alone; nothing else holds or closes it.
            let owned = unsafe { OwnedFd::from_raw_fd(record.fd) };
            let path = self.resolver.fd_path(record.fd);
            drop(owned);
            path
        } else {
            None
        };

        let process_name = self.resolver.process_name(record.pid);

        Some(EnrichedEvent {
            pid: record.pid,
            process_name,
            path,
            mask: record.mask,
        })
    }
}
