//! Config command.

use console::style;

use crate::config::Settings;

/// Print the effective configuration as TOML.
pub fn run(config: &Settings) -> anyhow::Result<()> {
    println!("{}", style("Current Configuration:").cyan().bold());
    println!("{}", "=".repeat(50));
    println!("{}", toml::to_string_pretty(config)?);

    if let Err(e) = config.validate() {
        eprintln!("{} {e}", style("Warning:").yellow().bold());
    }
    Ok(())
}
