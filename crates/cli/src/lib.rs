//! Aptdeck CLI Library
//!
//! This crate provides the terminal front-end for aptdeck. It lists and
//! searches installed packages and runs install, upgrade, remove and index
//! refresh actions through the system package manager, streaming their output
//! live.
//!
//! # Architecture
//!
//! - [`cli_args`]: Command-line argument parsing
//! - [`prompts`]: Confirmation questions and hidden credential entry
//! - [`session`]: Foreground execution of one action, with quit handling
//! - [`console`]: Rendering of package tables and command outcomes
//!
//! # Examples
//!
//! ```bash
//! # List every installed package
//! aptdeck list
//!
//! # Case-insensitive search on package names
//! aptdeck search python
//!
//! # Upgrade a package, confirming first and prompting for the sudo password
//! aptdeck upgrade nginx
//!
//! # Show what would run without running it
//! aptdeck --dry-run remove nginx
//!
//! # Refresh the package index without confirmation
//! aptdeck -f update
//! ```

pub mod cli_args;
pub mod console;
pub mod prompts;
pub mod session;
