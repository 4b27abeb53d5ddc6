//! Package name validation.
//!
//! Package names end up as argv elements of privileged commands, so they are
//! checked against the Debian naming rules before any template is rendered.
//! This also rejects names starting with `-` that apt would read as options.

use crate::error::{Error, Result};

fn is_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '.' | '-')
}

fn is_valid_base(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    name.len() >= 2
        && (first.is_ascii_lowercase() || first.is_ascii_digit())
        && chars.all(is_name_char)
}

fn is_valid_arch(arch: &str) -> bool {
    !arch.is_empty()
        && arch
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Validates a package name, optionally qualified with `:<arch>`.
///
/// # Errors
///
/// Returns [`Error::InvalidPackageName`] if the name does not follow the
/// Debian package naming rules.
pub fn validate_package_name(name: &str) -> Result<()> {
    let valid = match name.split_once(':') {
        Some((base, arch)) => is_valid_base(base) && is_valid_arch(arch),
        None => is_valid_base(name),
    };

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidPackageName(name.to_string()))
    }
}
