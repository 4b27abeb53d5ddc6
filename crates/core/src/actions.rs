//! Mutating package actions and the argv they expand to.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use crate::config::{Settings, PACKAGE_PLACEHOLDER};
use crate::error::{Error, Result};
use crate::interpolation::{get_templates, interpolate_command};
use crate::validation::validate_package_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageAction {
    Install(String),
    Upgrade(String),
    Remove(String),
    UpdateIndex,
}

impl PackageAction {
    pub fn package(&self) -> Option<&str> {
        match self {
            Self::Install(name) | Self::Upgrade(name) | Self::Remove(name) => Some(name),
            Self::UpdateIndex => None,
        }
    }

    fn template<'a>(&self, settings: &'a Settings) -> &'a [String] {
        match self {
            Self::Install(_) => &settings.actions.install,
            Self::Upgrade(_) => &settings.actions.upgrade,
            Self::Remove(_) => &settings.actions.remove,
            Self::UpdateIndex => &settings.actions.update,
        }
    }

    /// Builds the full argv for this action, elevation wrapper included.
    ///
    /// # Errors
    ///
    /// Returns an error if the package name is invalid, the template cannot be
    /// rendered, or the resulting command would be empty.
    pub fn argv(&self, settings: &Settings) -> Result<Vec<String>> {
        let mut context = HashMap::new();
        if let Some(name) = self.package() {
            validate_package_name(name)?;
            context.insert(PACKAGE_PLACEHOLDER.to_string(), name.to_string());
        }

        let template = self.template(settings);
        if template.is_empty() {
            return Err(Error::EmptyCommand);
        }

        let templates = get_templates(template)?;
        let rendered = interpolate_command(&context, &templates)?;

        let mut argv = match &settings.elevation {
            Some(elevation) => elevation.command.clone(),
            None => Vec::new(),
        };
        argv.extend(rendered);

        Ok(argv)
    }

    pub fn needs_credential(settings: &Settings) -> bool {
        settings
            .elevation
            .as_ref()
            .is_some_and(|elevation| elevation.reads_credential)
    }
}

impl Display for PackageAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Install(name) => write!(formatter, "install {name}"),
            Self::Upgrade(name) => write!(formatter, "upgrade {name}"),
            Self::Remove(name) => write!(formatter, "remove {name}"),
            Self::UpdateIndex => formatter.write_str("refresh package index"),
        }
    }
}
