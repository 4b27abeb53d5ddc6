//! Aptdeck Core Library
//!
//! This crate provides the engine behind aptdeck, a front-end for the system
//! package manager. It lists installed packages through an external query and
//! runs privileged install/upgrade/remove/update commands, streaming their
//! output line by line.
//!
//! # Key Features
//!
//! - **Command Runner**: One external process at a time, merged output streamed
//!   to a listener, optional credential on the input stream, cancellation
//! - **Catalog Loader**: Parses `<name> <version>` query output into records
//! - **Search**: Case-insensitive substring filtering on package names
//! - **Package Actions**: Argv templates with a privilege elevation wrapper
//! - **Configuration Management**: Optional YAML settings with built-in defaults
//!
//! # Examples
//!
//! Loading the catalog and filtering it:
//!
//! ```no_run
//! use aptdeck_core::catalog::{search, CatalogLoader};
//! use aptdeck_core::config::Settings;
//!
//! let loader = CatalogLoader::from_settings(&Settings::default());
//! let packages = loader.load_installed_packages()?;
//! for package in search("python", &packages) {
//!     println!("{package}");
//! }
//! # Ok::<(), aptdeck_core::error::Error>(())
//! ```

pub mod actions;
pub mod catalog;
pub mod config;
pub mod credential;
pub mod error;
pub mod file_handling;
pub mod interpolation;
pub mod runner;
pub mod validation;
