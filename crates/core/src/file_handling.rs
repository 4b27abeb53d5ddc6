//! Reading of the aptdeck settings file.

use std::fs::File;
use std::path::Path;

use log::debug;

use crate::config::Settings;
use crate::error::{Error, Result};

fn get_reader(file_description: &str, path: &str) -> Result<File> {
    match File::open(path) {
        Ok(reader) => Ok(reader),
        Err(e) => Err(Error::io_error(
            file_description.to_string(),
            path.to_string(),
            e,
        )),
    }
}

/// Loads settings from a YAML file.
///
/// A missing file is not an error: the built-in defaults are returned so
/// aptdeck works out of the box on a stock Debian system.
///
/// # Errors
///
/// Returns an error if:
/// - The file exists but cannot be read
/// - The YAML is malformed or doesn't match the expected structure
///
/// # Examples
///
/// ```no_run
/// use aptdeck_core::file_handling::get_settings;
///
/// let settings = get_settings("/home/me/.aptdeck/config.yml")?;
/// println!("Query: {:?}", settings.query_command);
/// # Ok::<(), aptdeck_core::error::Error>(())
/// ```
pub fn get_settings(config_path: &str) -> Result<Settings> {
    if !Path::exists(Path::new(config_path)) {
        debug!("No settings file at `{}`, using defaults", config_path);
        return Ok(Settings::default());
    }

    let config_reader = get_reader("config", config_path)?;

    // An empty file deserializes as unit, not as an empty mapping.
    if config_reader.metadata().map(|m| m.len() == 0).unwrap_or(false) {
        return Ok(Settings::default());
    }

    serde_yaml::from_reader(config_reader).map_err(|e| {
        Error::yaml_error(
            "reading".to_string(),
            "config".to_string(),
            config_path.to_string(),
            e,
        )
    })
}
