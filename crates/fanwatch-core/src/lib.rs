//! # fanwatch-core
//!
//! The event-stream engine behind fanwatch.
//!
//! Consumes a Linux fanotify notification channel covering a whole mount
//! and turns its binary records into [`EnrichedEvent`]s:
//! - **Channel**: acquisition, watch registration, and release of the
//!   kernel descriptor ([`channel`]).
//! - **Framing**: splitting a read buffer into variable-length records
//!   with bounds-checked cursor arithmetic ([`framer`]).
//! - **Enrichment**: fd to path and pid to process name, closing every
//!   delivered descriptor exactly once ([`enrich`]).
//! - **Monitor**: the start/stop controlled background loop that ties the
//!   pieces together and feeds an [`EventSink`] ([`monitor`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use fanwatch_common::config::MonitorConfig;
//! use fanwatch_common::types::EnrichedEvent;
//! use fanwatch_core::monitor::Monitor;
//!
//! let monitor = Monitor::new(MonitorConfig::default(), |event: &EnrichedEvent| {
//!     tracing::info!(pid = event.pid, mask = %event.mask, "file event");
//! });
//! monitor.start()?;
//! // ...
//! monitor.stop();
//! # Ok::<(), fanwatch_common::error::FanwatchError>(())
//! ```
//!
//! [`EnrichedEvent`]: fanwatch_common::types::EnrichedEvent
//! [`EventSink`]: sink::EventSink

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod channel;
pub mod enrich;
pub mod framer;
pub mod monitor;
pub mod sink;
