//! The monitor loop and its start/stop lifecycle.
//!
//! A [`Monitor`] owns at most one background thread. `start` acquires a
//! channel and spawns the thread; the thread reads into a reusable buffer,
//! frames the bytes, enriches each record and hands it to the sink, and
//! re-checks the running flag at the top of every iteration. `stop` only
//! flips that flag, so a thread blocked in `read(2)` exits after the next
//! event arrives. Callers that need a synchronous shutdown use
//! [`Monitor::join`] or [`ShutdownMode::Join`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use fanwatch_common::config::{MonitorConfig, ShutdownMode};
use fanwatch_common::constants::{FANOTIFY_METADATA_VERSION, MONITOR_THREAD_NAME};
use fanwatch_common::error::{FanwatchError, Result};

use crate::channel::{ChannelOpener, EventSource, FanotifyOpener};
use crate::enrich::{Enricher, ProcfsResolver, Resolver};
use crate::framer::frame;
use crate::sink::EventSink;

/// Lifecycle state of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorState {
    /// No channel is open and no loop is running.
    Idle,
    /// `start` is acquiring the channel.
    Starting,
    /// The loop is consuming events.
    Running,
    /// Stop was requested; the loop has not exited yet.
    Stopping,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// Snapshot of the monitor's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Reads that returned data.
    pub reads: u64,
    /// Reads that returned zero bytes.
    pub empty_reads: u64,
    /// Reads that failed.
    pub read_errors: u64,
    /// Records framed, overflow notifications included.
    pub records: u64,
    /// Queue-overflow notifications seen.
    pub overflows: u64,
    /// Events handed to the sink.
    pub dispatched: u64,
    /// Trailing bytes discarded as truncated or malformed.
    pub discarded_bytes: u64,
    /// Records whose enrichment or dispatch panicked.
    pub panics: u64,
}

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicU64,
    empty_reads: AtomicU64,
    read_errors: AtomicU64,
    records: AtomicU64,
    overflows: AtomicU64,
    dispatched: AtomicU64,
    discarded_bytes: AtomicU64,
    panics: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        let _ = counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MonitorStats {
        MonitorStats {
            reads: self.reads.load(Ordering::Relaxed),
            empty_reads: self.empty_reads.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            discarded_bytes: self.discarded_bytes.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the controlling handle and the loop thread.
#[derive(Debug)]
struct Shared {
    running: AtomicBool,
    state: Mutex<MonitorState>,
    counters: Counters,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A filesystem event monitor.
///
/// Owned by the host; there is no process-wide instance. Starting an
/// already running monitor is a no-op, and so is stopping an idle one.
pub struct Monitor {
    config: MonitorConfig,
    sink: Arc<dyn EventSink>,
    opener: Arc<dyn ChannelOpener>,
    enricher: Enricher,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Creates an idle monitor on the real fanotify channel.
    pub fn new(config: MonitorConfig, sink: impl EventSink + 'static) -> Self {
        Self::with_parts(
            config,
            Arc::new(sink),
            Arc::new(FanotifyOpener),
            Arc::new(ProcfsResolver::default()),
        )
    }

    /// Creates an idle monitor from explicit collaborators.
    pub fn with_parts(
        config: MonitorConfig,
        sink: Arc<dyn EventSink>,
        opener: Arc<dyn ChannelOpener>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        Self {
            config,
            sink,
            opener,
            enricher: Enricher::new(resolver),
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                state: Mutex::new(MonitorState::Idle),
                counters: Counters::default(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Returns the configuration this monitor was built with.
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> MonitorState {
        *self.shared.lock_state()
    }

    /// Returns `true` while the loop is consuming events.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Returns a snapshot of the counters accumulated since creation.
    pub fn stats(&self) -> MonitorStats {
        self.shared.counters.snapshot()
    }

    /// Acquires the channel and starts the loop thread.
    ///
    /// A no-op while already starting or running. While stopping, the
    /// still-live loop is re-armed instead of opening a second channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the channel
    /// cannot be acquired, or the thread cannot be spawned. The monitor
    /// is left idle in every case.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.shared.lock_state();
            match *state {
                MonitorState::Starting | MonitorState::Running => return Ok(()),
                MonitorState::Stopping => {
                    self.shared.running.store(true, Ordering::Release);
                    *state = MonitorState::Running;
                    tracing::info!("monitor re-armed before loop exit");
                    return Ok(());
                }
                MonitorState::Idle => *state = MonitorState::Starting,
            }
        }

        let source = match self
            .config
            .validate()
            .and_then(|()| self.opener.open(&self.config))
        {
            Ok(source) => source,
            Err(e) => {
                *self.shared.lock_state() = MonitorState::Idle;
                tracing::warn!(error = %e, "monitor failed to start");
                return Err(e);
            }
        };

        self.reap_finished_worker();

        let mut state = self.shared.lock_state();
        if *state == MonitorState::Stopping {
            drop(source);
            *state = MonitorState::Idle;
            tracing::info!("stop requested during start, channel released");
            return Ok(());
        }

        self.shared.running.store(true, Ordering::Release);
        let worker = Worker {
            shared: Arc::clone(&self.shared),
            sink: Arc::clone(&self.sink),
            enricher: self.enricher.clone(),
            buffer_size: self.config.buffer_size,
            retry_backoff: Duration::from_millis(self.config.read_retry_backoff_ms),
        };
        let spawned = std::thread::Builder::new()
            .name(MONITOR_THREAD_NAME.into())
            .spawn(move || worker.run(source));
        match spawned {
            Ok(handle) => {
                *state = MonitorState::Running;
                drop(state);
                *self.lock_worker() = Some(handle);
                tracing::info!(root = %self.config.watch_root.display(), "monitor started");
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                *state = MonitorState::Idle;
                Err(FanwatchError::Spawn { source: e })
            }
        }
    }

    /// Requests the loop to stop and returns immediately.
    ///
    /// The loop notices at its next iteration boundary, which may be after
    /// the next event arrives. Stopping an idle monitor does nothing.
    pub fn stop(&self) {
        let mut state = self.shared.lock_state();
        match *state {
            MonitorState::Running | MonitorState::Starting => {
                self.shared.running.store(false, Ordering::Release);
                *state = MonitorState::Stopping;
                tracing::info!("monitor stop requested");
            }
            MonitorState::Idle | MonitorState::Stopping => {}
        }
    }

    /// Waits for the loop thread to exit.
    ///
    /// Returns `true` if a thread was waited on. Blocks until the loop
    /// observes a stop request, so call [`Monitor::stop`] first.
    pub fn join(&self) -> bool {
        let handle = self.lock_worker().take();
        let Some(handle) = handle else {
            return false;
        };
        if handle.join().is_err() {
            tracing::error!("monitor thread panicked");
        }
        true
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reap_finished_worker(&self) {
        let mut worker = self.lock_worker();
        if worker.as_ref().is_some_and(JoinHandle::is_finished) {
            if let Some(handle) = worker.take() {
                if handle.join().is_err() {
                    tracing::error!("previous monitor thread panicked");
                }
            }
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
        if self.config.shutdown == ShutdownMode::Join {
            let _ = self.join();
        }
    }
}

/// Everything the loop thread owns.
struct Worker {
    shared: Arc<Shared>,
    sink: Arc<dyn EventSink>,
    enricher: Enricher,
    buffer_size: usize,
    retry_backoff: Duration,
}

/// Holds the channel for the loop thread.
///
/// If the thread unwinds while the channel is still held, dropping the
/// guard releases it and resets the monitor to idle so a later `start`
/// acquires a fresh channel.
struct ChannelGuard {
    shared: Arc<Shared>,
    source: Option<Box<dyn EventSource>>,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        if let Some(source) = self.source.take() {
            let mut state = self.shared.lock_state();
            self.shared.running.store(false, Ordering::Release);
            drop(source);
            *state = MonitorState::Idle;
            tracing::error!("monitor loop terminated abnormally, channel released");
        }
    }
}

impl Worker {
    fn run(self, source: Box<dyn EventSource>) {
        let mut guard = ChannelGuard {
            shared: Arc::clone(&self.shared),
            source: Some(source),
        };
        let mut buf = vec![0u8; self.buffer_size];
        let mut version_warned = false;
        let counters = &self.shared.counters;

        loop {
            if !self.shared.running.load(Ordering::Acquire) {
                let mut state = self.shared.lock_state();
                if !self.shared.running.load(Ordering::Acquire) {
                    drop(guard.source.take());
                    *state = MonitorState::Idle;
                    tracing::info!("monitor loop exited, channel released");
                    return;
                }
            }

            let Some(source) = guard.source.as_mut() else {
                return;
            };
            let len = match source.read_into(&mut buf) {
                Ok(0) => {
                    Counters::bump(&counters.empty_reads, 1);
                    continue;
                }
                Ok(len) => len,
                Err(e) => {
                    Counters::bump(&counters.read_errors, 1);
                    tracing::debug!(error = %e, "channel read failed, retrying");
                    if !self.retry_backoff.is_zero() {
                        std::thread::sleep(self.retry_backoff);
                    }
                    continue;
                }
            };
            Counters::bump(&counters.reads, 1);

            let mut records = frame(&buf[..len.min(buf.len())]);
            for record in records.by_ref() {
                Counters::bump(&counters.records, 1);
                if record.is_overflow() {
                    Counters::bump(&counters.overflows, 1);
                    tracing::warn!(offset = record.offset, "fanotify queue overflow, events lost");
                    continue;
                }
                if record.version != FANOTIFY_METADATA_VERSION && !version_warned {
                    version_warned = true;
                    tracing::warn!(
                        version = record.version,
                        expected = FANOTIFY_METADATA_VERSION,
                        "unexpected fanotify metadata version"
                    );
                }
                // The enricher owns the fd before any callback runs, so a
                // panic still closes it.
                let dispatched = panic::catch_unwind(AssertUnwindSafe(|| {
                    let event = self.enricher.enrich(&record)?;
                    self.sink.on_event(&event);
                    Some(())
                }));
                match dispatched {
                    Ok(Some(())) => Counters::bump(&counters.dispatched, 1),
                    Ok(None) => {}
                    Err(_) => {
                        Counters::bump(&counters.panics, 1);
                        tracing::error!(
                            pid = record.pid,
                            offset = record.offset,
                            "event handling panicked, record dropped"
                        );
                    }
                }
            }
            let discarded = records.remainder();
            if discarded > 0 {
                Counters::bump(&counters.discarded_bytes, discarded as u64);
                tracing::debug!(discarded, "discarding truncated buffer tail");
            }
        }
    }
}
