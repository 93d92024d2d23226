//! `fanwatch watch` — Stream enriched events until interrupted.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Args;
use fanwatch_common::types::EnrichedEvent;
use fanwatch_core::monitor::Monitor;
use fanwatch_core::sink::EventSink;

use crate::commands::MonitorArgs;
use crate::output::{Format, format_event};

/// Arguments for the `watch` command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Monitor configuration flags.
    #[command(flatten)]
    pub monitor: MonitorArgs,

    /// Output line format.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

/// Sink writing one line per event to a writer.
struct LineSink<W> {
    out: Mutex<W>,
    format: Format,
    broken: AtomicBool,
}

impl<W: Write + Send> EventSink for LineSink<W> {
    fn on_event(&self, event: &EnrichedEvent) {
        if self.broken.load(Ordering::Relaxed) {
            return;
        }
        let line = format_event(event, self.format, chrono::Utc::now());
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            self.broken.store(true, Ordering::Relaxed);
            tracing::warn!(error = %e, "stdout closed, no further events will be printed");
        }
    }
}

/// Executes the `watch` command.
///
/// Starts a monitor on the configured root and blocks until Ctrl+C.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the channel cannot
/// be acquired, or the Ctrl+C handler cannot be installed.
pub fn execute(args: WatchArgs) -> anyhow::Result<()> {
    let config = args.monitor.resolve()?;
    let sink = LineSink {
        out: Mutex::new(std::io::stdout()),
        format: args.format,
        broken: AtomicBool::new(false),
    };
    let monitor = Monitor::new(config, sink);

    if let Err(e) = monitor.start() {
        if e.is_permission_denied() {
            tracing::error!("fanotify requires CAP_SYS_ADMIN; run as root");
        }
        return Err(e.into());
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

    while running.load(Ordering::SeqCst) && monitor.is_running() {
        std::thread::sleep(Duration::from_millis(250));
    }

    monitor.stop();
    if monitor.config().shutdown == fanwatch_common::config::ShutdownMode::Join {
        tracing::info!("waiting for the monitor to release the channel");
        let _ = monitor.join();
    }

    let stats = monitor.stats();
    tracing::info!(
        dispatched = stats.dispatched,
        overflows = stats.overflows,
        read_errors = stats.read_errors,
        discarded_bytes = stats.discarded_bytes,
        panics = stats.panics,
        "monitor stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use fanwatch_common::types::EventMask;

    use super::*;

    #[test]
    fn line_sink_writes_one_line_per_event() {
        let sink = LineSink {
            out: Mutex::new(Vec::new()),
            format: Format::Json,
            broken: AtomicBool::new(false),
        };
        for pid in [1, 2] {
            sink.on_event(&EnrichedEvent {
                pid,
                process_name: None,
                path: Some(PathBuf::from("/tmp/x")),
                mask: EventMask::MODIFY,
            });
        }
        let written = String::from_utf8(sink.out.into_inner().unwrap()).expect("utf8");
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"pid\":1"));
        assert!(lines[1].contains("\"pid\":2"));
    }
}
