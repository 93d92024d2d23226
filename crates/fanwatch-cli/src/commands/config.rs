//! `fanwatch config` — Print the effective monitor configuration.

use clap::Args;

use crate::commands::MonitorArgs;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Monitor configuration flags.
    #[command(flatten)]
    pub monitor: MonitorArgs,
}

/// Executes the `config` command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or is invalid.
pub fn execute(args: &ConfigArgs) -> anyhow::Result<()> {
    let config = args.monitor.resolve()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
