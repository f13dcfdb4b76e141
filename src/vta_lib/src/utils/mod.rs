//! This module contains various utility modules and helper functions.

pub mod log;

use crate::prelude::*;

/// Get the contents of a configuration file from the configuration directory of the user.
pub fn read_config_file(filename: &str) -> Result<serde_json::Value, Error> {
    let project_dirs = directories::ProjectDirs::from("", "", "vta")
        .context("Could not discern location of configuration files.")?;
    let config_dir = project_dirs.config_dir();
    let config_path = config_dir.join(filename);
    let config_file = std::fs::read_to_string(&config_path).with_context(|| {
        format!(
            "Could not read configuration file {}",
            config_path.display()
        )
    })?;
    Ok(serde_json::from_str(&config_file)?)
}

/// Get the default configuration bundled with the library.
pub fn default_config() -> Result<serde_json::Value, Error> {
    serde_json::from_str(include_str!("../../../config.json"))
        .context("Bundled configuration file is not valid JSON")
}
