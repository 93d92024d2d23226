//! Formatted output helpers for CLI commands.
//!
//! Renders enriched events as single text or JSON lines.

use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use fanwatch_common::types::EnrichedEvent;
use serde::Serialize;

/// Line format for streamed events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// `<time> <pid> <name> <MASK> <path>`.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    time: String,
    #[serde(flatten)]
    event: &'a EnrichedEvent,
    flags: Vec<&'static str>,
}

/// Renders one event as a line without the trailing newline.
#[must_use]
pub fn format_event(event: &EnrichedEvent, format: Format, at: DateTime<Utc>) -> String {
    let time = at.to_rfc3339_opts(SecondsFormat::Millis, true);
    match format {
        Format::Text => format!(
            "{time} {pid:>7} {name} {mask} {path}",
            pid = event.pid,
            name = display_or_unknown(event.process_name.as_deref()),
            mask = event.mask,
            path = event
                .path
                .as_ref()
                .map_or_else(|| "?".to_string(), |p| p.display().to_string()),
        ),
        Format::Json => {
            let line = JsonLine {
                time,
                event,
                flags: event.mask.names().collect(),
            };
            serde_json::to_string(&line).unwrap_or_default()
        }
    }
}

fn display_or_unknown(value: Option<&str>) -> &str {
    match value {
        None => "?",
        Some("") => "-",
        Some(v) => v,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::TimeZone;
    use fanwatch_common::types::EventMask;

    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    fn event() -> EnrichedEvent {
        EnrichedEvent {
            pid: 4321,
            process_name: Some("/usr/bin/vim".into()),
            path: Some(PathBuf::from("/etc/hosts")),
            mask: EventMask::OPEN | EventMask::ACCESS,
        }
    }

    #[test]
    fn text_line_lists_all_fields() {
        let line = format_event(&event(), Format::Text, at());
        assert_eq!(
            line,
            "2026-01-02T03:04:05.000Z    4321 /usr/bin/vim ACCESS|OPEN /etc/hosts"
        );
    }

    #[test]
    fn text_line_marks_unresolved_and_empty_fields() {
        let mut e = event();
        e.path = None;
        e.process_name = Some(String::new());
        let line = format_event(&e, Format::Text, at());
        assert!(line.ends_with(" - ACCESS|OPEN ?"));

        e.process_name = None;
        let line = format_event(&e, Format::Text, at());
        assert!(line.contains(" ? ACCESS|OPEN ?"));
    }

    #[test]
    fn json_line_carries_event_and_flag_names() {
        let line = format_event(&event(), Format::Json, at());
        let value: serde_json::Value = serde_json::from_str(&line).expect("json");
        assert_eq!(value["pid"], 4321);
        assert_eq!(value["path"], "/etc/hosts");
        assert_eq!(value["process_name"], "/usr/bin/vim");
        assert_eq!(value["mask"], 0x21);
        assert_eq!(value["flags"], serde_json::json!(["access", "open"]));
        assert_eq!(value["time"], "2026-01-02T03:04:05.000Z");
    }
}
