//! Terminal rendering of catalogs, command headers and outcomes.

use std::io::Write;

use aptdeck_core::catalog::PackageRecord;
use aptdeck_core::error::Result;
use aptdeck_core::runner::ExecutionOutcome;
use crossterm::queue;
use crossterm::style::Color::{DarkGreen, Red, Reset, Yellow};
use crossterm::style::{Attribute, Color, Print, SetAttribute, SetForegroundColor};
use itertools::Itertools;

const NAME_HEADER: &str = "Package";
const VERSION_HEADER: &str = "Version";

/// Formats packages as two aligned columns, header first.
pub fn format_package_table(packages: &[PackageRecord]) -> Vec<String> {
    let name_width = packages
        .iter()
        .map(|package| package.name.len())
        .chain([NAME_HEADER.len()])
        .max()
        .unwrap_or(NAME_HEADER.len());

    std::iter::once(format!("{NAME_HEADER:<name_width$}  {VERSION_HEADER}"))
        .chain(
            packages
                .iter()
                .map(|package| format!("{:<name_width$}  {}", package.name, package.version)),
        )
        .collect()
}

pub fn print_packages<W: Write>(out: &mut W, packages: &[PackageRecord]) -> Result<()> {
    let mut rows = format_package_table(packages).into_iter();

    if let Some(header) = rows.next() {
        queue!(
            out,
            SetAttribute(Attribute::Bold),
            Print(header),
            SetAttribute(Attribute::Reset),
            Print("\n"),
        )?;
    }
    for row in rows {
        writeln!(out, "{row}")?;
    }
    writeln!(out, "{} package(s)", packages.len())?;
    out.flush()?;

    Ok(())
}

pub fn format_argv(argv: &[String]) -> String {
    argv.iter().join(" ")
}

pub fn print_running<W: Write>(out: &mut W, argv: &[String]) -> Result<()> {
    writeln!(out, "Running: {}\n", format_argv(argv))?;
    out.flush()?;
    Ok(())
}

/// A one-line summary of how a command ended, and the colour to show it in.
pub fn describe_outcome(outcome: &ExecutionOutcome) -> (String, Color) {
    match outcome {
        ExecutionOutcome::Completed { exit_code: 0 } => {
            ("Finished successfully.".to_string(), DarkGreen)
        }
        ExecutionOutcome::Completed { exit_code } => {
            (format!("Exited with status {exit_code}."), Red)
        }
        ExecutionOutcome::Failed { error_message } => (format!("Error: {error_message}"), Red),
        ExecutionOutcome::Cancelled => ("Cancelled.".to_string(), Yellow),
    }
}

pub fn print_outcome<W: Write>(out: &mut W, outcome: &ExecutionOutcome) -> Result<()> {
    let (message, color) = describe_outcome(outcome);
    queue!(
        out,
        Print("\n"),
        SetForegroundColor(color),
        Print(message),
        SetForegroundColor(Reset),
        Print("\n"),
    )?;
    out.flush()?;
    Ok(())
}

/// Describes a package's state in a freshly loaded catalog.
pub fn describe_package_state(name: &str, packages: &[PackageRecord]) -> String {
    match packages.iter().find(|package| package.name == name) {
        Some(package) => format!("{} is now at version {}.", package.name, package.version),
        None => format!("{name} is not installed."),
    }
}
