//! Utility functions for CLI commands.

use std::path::PathBuf;

use facesort::Settings;

use crate::Cli;

/// Resolves the settings file path.
pub fn settings_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.config {
        Some(p) => Ok(PathBuf::from(p)),
        None => Settings::default_path().ok_or_else(|| anyhow::anyhow!("cannot determine config path")),
    }
}

/// Loads and validates the settings.
pub fn get_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let settings = Settings::load(&settings_path(cli)?)?;
    settings.validate()?;
    Ok(settings)
}

/// Prints a success message to stderr.
pub fn print_success(msg: &str) {
    eprintln!("[OK] {}", msg);
}
