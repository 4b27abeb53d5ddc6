//! Command-line argument parsing.
//!
//! This module defines the command-line interface structure using the `clap`
//! crate and maps mutating subcommands onto core [`PackageAction`]s.

use aptdeck_core::actions::PackageAction;
use clap::{Parser, Subcommand};

/// Command-line arguments for the aptdeck CLI tool.
///
/// # Examples
///
/// ```rust
/// use clap::Parser;
/// use aptdeck_cli::cli_args::Args;
///
/// let args = Args::parse_from(["aptdeck", "search", "python"]);
/// ```
#[derive(Parser, Debug)] // requires `derive` feature
#[command(term_width = 0)] // Just to make testing across clap features easier
pub struct Args {
    /// Path to the settings YAML file.
    ///
    /// If not provided, defaults to `~/.aptdeck/config.yml`. A missing file
    /// means built-in defaults for dpkg/apt with sudo.
    #[arg(long, short = 'c', global = true)]
    pub config_path: Option<String>,

    /// Print the command that would run, but do not execute it.
    #[arg(long, short = 'd', action, global = true)]
    pub dry_run: bool,

    /// Run without first confirming if the command should be run.
    #[arg(long, short = 'f', action, global = true)]
    pub force: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List installed packages.
    List,

    /// List installed packages whose name contains QUERY (case-insensitive).
    Search { query: String },

    /// Install a package.
    Install { package: String },

    /// Upgrade an installed package.
    Upgrade { package: String },

    /// Remove an installed package.
    Remove { package: String },

    /// Refresh the package index (`apt-get update`).
    Update,
}

impl Command {
    /// The package action this subcommand performs, if it mutates the system.
    pub fn action(&self) -> Option<PackageAction> {
        match self {
            Command::List | Command::Search { .. } => None,
            Command::Install { package } => Some(PackageAction::Install(package.clone())),
            Command::Upgrade { package } => Some(PackageAction::Upgrade(package.clone())),
            Command::Remove { package } => Some(PackageAction::Remove(package.clone())),
            Command::Update => Some(PackageAction::UpdateIndex),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_values() {
        let args = Args::parse_from(["aptdeck", "list"]);
        assert_eq!(args.config_path, None);
        assert!(!args.dry_run);
        assert!(!args.force);
        assert_eq!(args.command, Command::List);
    }

    #[test]
    fn test_search_query() {
        let args = Args::parse_from(["aptdeck", "search", "ssl"]);
        assert_eq!(
            args.command,
            Command::Search {
                query: "ssl".to_string()
            }
        );
        assert_eq!(args.command.action(), None);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["aptdeck", "remove", "nginx", "-f", "-c", "/tmp/c.yml"]);
        assert!(args.force);
        assert_eq!(args.config_path, Some("/tmp/c.yml".to_string()));
        assert_eq!(
            args.command.action(),
            Some(PackageAction::Remove("nginx".to_string()))
        );
    }

    #[test]
    fn test_update_action() {
        let args = Args::parse_from(["aptdeck", "--dry-run", "update"]);
        assert!(args.dry_run);
        assert_eq!(args.command.action(), Some(PackageAction::UpdateIndex));
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Args::try_parse_from(["aptdeck"]).is_err());
    }

    #[test]
    fn test_upgrade_requires_package() {
        assert!(Args::try_parse_from(["aptdeck", "upgrade"]).is_err());
    }
}
