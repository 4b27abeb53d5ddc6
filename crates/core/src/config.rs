//! Settings and configuration path utilities for aptdeck.
//!
//! This module describes the commands aptdeck shells out to: the catalog
//! query, the privilege elevation wrapper and the per-action argv templates.
//! Every field has a built-in default matching a stock Debian/Ubuntu system,
//! so the settings file is optional.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default path for the settings file
const DEFAULT_CONFIG_PATH: &str = "~/.aptdeck/config.yml";

/// Placeholder replaced with the package name in action templates
pub const PACKAGE_PLACEHOLDER: &str = "package";

/// A privilege elevation wrapper prefixed to every mutating command.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ElevationDefinition {
    pub command: Vec<String>,
    /// Whether the wrapper expects a credential on its input stream (`sudo -S`).
    #[serde(default = "default_reads_credential")]
    pub reads_credential: bool,
}

impl Default for ElevationDefinition {
    fn default() -> Self {
        Self {
            command: vec!["sudo".to_string(), "-S".to_string()],
            reads_credential: true,
        }
    }
}

/// Argv templates for each mutating action. `{package}` is replaced with the
/// selected package name.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ActionTemplates {
    pub install: Vec<String>,
    pub upgrade: Vec<String>,
    pub remove: Vec<String>,
    pub update: Vec<String>,
}

impl Default for ActionTemplates {
    fn default() -> Self {
        Self {
            install: to_argv(&["apt", "install", "{package}", "-y"]),
            upgrade: to_argv(&["apt", "install", "--only-upgrade", "{package}", "-y"]),
            remove: to_argv(&["apt", "remove", "{package}", "-y"]),
            update: to_argv(&["apt-get", "update"]),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Argv printing one `<name> <version>` line per installed package.
    pub query_command: Vec<String>,
    pub elevation: Option<ElevationDefinition>,
    pub actions: ActionTemplates,
    pub environment: Option<HashMap<String, String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            query_command: to_argv(&["dpkg-query", "-W", "-f=${Package} ${Version}\n"]),
            elevation: Some(ElevationDefinition::default()),
            actions: ActionTemplates::default(),
            environment: None,
        }
    }
}

fn default_reads_credential() -> bool {
    true
}

fn to_argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(ToString::to_string).collect()
}

/// Resolves the settings file path.
///
/// If a custom path is provided, uses that path. Otherwise, uses the default
/// settings path. Shell expansions like `~` are resolved.
///
/// # Examples
///
/// ```
/// use aptdeck_core::config::get_config_path;
///
/// // Use default path
/// let default_path = get_config_path(&None);
///
/// // Use custom path
/// let custom_path = get_config_path(&Some("/path/to/config.yml".to_string()));
/// ```
pub fn get_config_path(config_path_arg: &Option<String>) -> String {
    let config_path = match config_path_arg {
        Some(config_path) => config_path,
        None => DEFAULT_CONFIG_PATH,
    };

    shellexpand::tilde(config_path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_path_with_custom_path() {
        let custom_path = Some("/custom/path/config.yml".to_string());
        let result = get_config_path(&custom_path);
        assert_eq!(result, "/custom/path/config.yml");
    }

    #[test]
    fn test_get_config_path_with_none() {
        let result = get_config_path(&None);
        assert!(result.ends_with(".aptdeck/config.yml"));
        assert!(!result.starts_with('~'));
    }

    #[test]
    fn test_get_config_path_with_tilde() {
        let tilde_path = Some("~/my-config.yml".to_string());
        let result = get_config_path(&tilde_path);
        assert!(!result.starts_with('~'));
        assert!(result.ends_with("my-config.yml"));
    }

    #[test]
    fn test_default_query_command() {
        let settings = Settings::default();
        assert_eq!(settings.query_command[0], "dpkg-query");
        assert_eq!(settings.query_command[2], "-f=${Package} ${Version}\n");
    }

    #[test]
    fn test_default_elevation_reads_credential() {
        let elevation = Settings::default().elevation.unwrap();
        assert_eq!(elevation.command, vec!["sudo", "-S"]);
        assert!(elevation.reads_credential);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings: Settings = serde_yaml::from_str("environment:\n  LANG: C\n").unwrap();
        assert_eq!(settings.actions, ActionTemplates::default());
        assert_eq!(settings.query_command, Settings::default().query_command);
        assert_eq!(
            settings.environment.unwrap().get("LANG"),
            Some(&"C".to_string())
        );
    }

    #[test]
    fn test_null_elevation_disables_wrapper() {
        let settings: Settings = serde_yaml::from_str("elevation: null\n").unwrap();
        assert!(settings.elevation.is_none());
    }
}
