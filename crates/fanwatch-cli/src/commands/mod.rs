//! CLI command definitions and dispatch.

pub mod config;
pub mod decode;
pub mod watch;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fanwatch_common::config::{MonitorConfig, ShutdownMode, WatchScope};
use fanwatch_common::types::EventMask;

/// fanwatch — Whole-mount filesystem activity monitor.
#[derive(Parser, Debug)]
#[command(name = "fanwatch", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream enriched events until Ctrl+C.
    Watch(watch::WatchArgs),
    /// Decode a captured raw fanotify buffer without enriching it.
    Decode(decode::DecodeArgs),
    /// Print the effective monitor configuration as JSON.
    Config(config::ConfigArgs),
}

/// Scope values accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    /// Whole mount containing the root.
    Mount,
    /// Whole filesystem containing the root.
    Filesystem,
    /// The root directory and its direct children.
    Directory,
}

impl From<ScopeArg> for WatchScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Mount => Self::Mount,
            ScopeArg::Filesystem => Self::Filesystem,
            ScopeArg::Directory => Self::Directory,
        }
    }
}

/// Flags that shape a [`MonitorConfig`].
///
/// Values given on the command line override those from `--config`.
#[derive(Args, Debug, Default)]
pub struct MonitorArgs {
    /// JSON configuration file.
    #[arg(long, env = "FANWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path whose mount (or directory) is watched.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Extent of the watch.
    #[arg(long, value_enum)]
    pub scope: Option<ScopeArg>,

    /// Comma-separated event types (open,access,modify,close-write,delete,...).
    #[arg(long)]
    pub events: Option<EventMask>,

    /// Read buffer size in bytes.
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Wait for the monitor thread to release the channel on exit.
    #[arg(long)]
    pub wait: bool,
}

impl MonitorArgs {
    /// Builds and validates the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the result
    /// is invalid.
    pub fn resolve(&self) -> anyhow::Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::from_json_file(path)?,
            None => MonitorConfig::default(),
        };
        if let Some(root) = &self.root {
            config.watch_root.clone_from(root);
        }
        if let Some(scope) = self.scope {
            config.scope = scope.into();
        }
        if let Some(events) = self.events {
            config.event_mask = events;
        }
        if let Some(size) = self.buffer_size {
            config.buffer_size = size;
        }
        if self.wait {
            config.shutdown = ShutdownMode::Join;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Watch(args) => watch::execute(args),
        Command::Decode(args) => decode::execute(args),
        Command::Config(args) => config::execute(&args),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn cli_parses_watch_flags() {
        let cli = Cli::try_parse_from([
            "fanwatch",
            "watch",
            "--root",
            "/home",
            "--scope",
            "directory",
            "--events",
            "open,delete",
            "--format",
            "json",
        ])
        .expect("parse");
        let Command::Watch(args) = cli.command else {
            unreachable!("expected watch");
        };
        let config = args.monitor.resolve().expect("resolve");
        assert_eq!(config.watch_root, PathBuf::from("/home"));
        assert_eq!(config.scope, WatchScope::Directory);
        assert_eq!(config.event_mask, EventMask::OPEN | EventMask::DELETE);
    }

    #[test]
    fn unknown_event_name_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["fanwatch", "watch", "--events", "open,explode"]);
        assert!(result.is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{ "watch_root": "/srv", "buffer_size": 960 }}"#).expect("write");

        let args = MonitorArgs {
            config: Some(file.path().to_path_buf()),
            buffer_size: Some(480),
            wait: true,
            ..MonitorArgs::default()
        };
        let config = args.resolve().expect("resolve");
        assert_eq!(config.watch_root, PathBuf::from("/srv"));
        assert_eq!(config.buffer_size, 480);
        assert_eq!(config.shutdown, ShutdownMode::Join);
    }

    #[test]
    fn invalid_override_fails_validation() {
        let args = MonitorArgs {
            buffer_size: Some(8),
            ..MonitorArgs::default()
        };
        assert!(args.resolve().is_err());
    }
}
