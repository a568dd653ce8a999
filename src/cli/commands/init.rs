//! Init command.

use std::process::ExitCode;

use crate::config::{CONFIG_DIR, Settings};

/// Create `.bookrag/settings.toml` in the current directory.
pub fn run(force: bool) -> ExitCode {
    let config_path = std::path::Path::new(CONFIG_DIR).join("settings.toml");

    if config_path.exists() && !force {
        eprintln!(
            "Configuration file already exists at: {}",
            config_path.display()
        );
        eprintln!("Use --force to overwrite");
        return ExitCode::FAILURE;
    }

    match Settings::init_config_file(".", force) {
        Ok(path) => {
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
