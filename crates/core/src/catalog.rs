//! Installed package catalog.
//!
//! The catalog is produced by a single query command printing one
//! `<name> <version>` line per installed package. Each load yields a fresh
//! list that replaces the previous one wholesale.

use std::fmt::{Display, Formatter};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::config::Settings;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
}

impl Display for PackageRecord {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} {}", self.name, self.version)
    }
}

/// Parses query output into package records.
///
/// Only lines made of exactly two whitespace-separated tokens are kept;
/// anything else, blank lines included, is skipped without an error.
pub fn parse_catalog(output: &str) -> Vec<PackageRecord> {
    output
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            match (tokens.next(), tokens.next(), tokens.next()) {
                (Some(name), Some(version), None) => Some(PackageRecord {
                    name: name.to_string(),
                    version: version.to_string(),
                }),
                (None, ..) => None,
                _ => {
                    debug!("Skipping malformed catalog line: {:?}", line);
                    None
                }
            }
        })
        .collect()
}

/// Returns the packages whose name contains `query`, ignoring case.
///
/// An empty query returns every package; input order is preserved.
pub fn search(query: &str, packages: &[PackageRecord]) -> Vec<PackageRecord> {
    let query = query.to_lowercase();

    packages
        .iter()
        .filter(|package| package.name.to_lowercase().contains(&query))
        .cloned()
        .collect()
}

#[derive(Debug, Clone)]
pub struct CatalogLoader {
    query_command: Vec<String>,
}

impl CatalogLoader {
    pub fn new(query_command: Vec<String>) -> Self {
        Self { query_command }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.query_command.clone())
    }

    pub fn query_command(&self) -> &[String] {
        &self.query_command
    }

    /// Runs the query command and waits for it to exit.
    ///
    /// This blocks the calling thread; use [`CatalogLoader::spawn_load`] from
    /// a presentation thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueryFailed`] with the trimmed error output if the
    /// query exits with a non-zero status, and [`Error::LaunchFailed`] if it
    /// cannot be started.
    pub fn load_installed_packages(&self) -> Result<Vec<PackageRecord>> {
        let Some((program, args)) = self.query_command.split_first() else {
            return Err(Error::EmptyCommand);
        };

        debug!("Loading catalog with {:?}", self.query_command);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::LaunchFailed(format!("Failed to spawn {program}: {e}")))?;

        if !output.status.success() {
            let error_text = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                "Catalog query exited with {}: {}",
                output.status, error_text
            );
            return Err(Error::QueryFailed(error_text));
        }

        let packages = parse_catalog(&String::from_utf8_lossy(&output.stdout));
        debug!("Loaded {} packages", packages.len());

        Ok(packages)
    }

    /// Loads the catalog on a worker thread and hands the result to `on_done`
    /// on that thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread could not be started.
    pub fn spawn_load<F>(&self, on_done: F) -> Result<JoinHandle<()>>
    where
        F: FnOnce(Result<Vec<PackageRecord>>) + Send + 'static,
    {
        let loader = self.clone();
        let handle = thread::Builder::new()
            .name("aptdeck-catalog".to_string())
            .spawn(move || on_done(loader.load_installed_packages()))?;

        Ok(handle)
    }
}
