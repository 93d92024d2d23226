//! `fanwatch decode` — Decode a captured raw fanotify buffer.
//!
//! Only headers are printed. The descriptors in a capture belong to the
//! process that recorded it, so nothing is resolved or closed here.

use std::path::PathBuf;

use clap::Args;
use fanwatch_core::framer::frame;

/// Arguments for the `decode` command.
#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding bytes read from a fanotify descriptor.
    pub file: PathBuf,
}

/// Executes the `decode` command.
///
/// # Errors
///
/// Returns an error if the capture cannot be read.
pub fn execute(args: DecodeArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.file)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", args.file.display()))?;

    println!(
        "{:<8} {:<6} {:<4} {:<6} {:<8} {:<8} FLAGS",
        "OFFSET", "LEN", "VER", "FD", "PID", "MASK"
    );
    let mut records = frame(&bytes);
    for r in records.by_ref() {
        println!(
            "{:<8} {:<6} {:<4} {:<6} {:<8} {:<#8x} {}",
            r.offset,
            r.event_len,
            r.version,
            r.fd,
            r.pid,
            r.mask.bits(),
            r.mask
        );
    }
    let tail = records.remainder();
    if tail > 0 {
        println!("{tail} trailing byte(s) not framed");
    }
    Ok(())
}
