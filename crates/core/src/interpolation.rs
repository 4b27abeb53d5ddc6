use std::collections::HashMap;

use leon::Template;

use crate::error::Result;

pub fn get_templates(command: &[String]) -> Result<Vec<Template>> {
    let mut templates: Vec<Template> = Vec::new();

    for argument in command {
        templates.push(Template::parse(argument.as_ref())?);
    }

    Ok(templates)
}

/// Renders every argument template against `context`.
///
/// # Errors
///
/// Returns an error if a template references a key missing from `context`.
pub fn interpolate_command(
    context: &HashMap<String, String>,
    templates: &[Template],
) -> Result<Vec<String>> {
    let mut interpolated_arguments: Vec<String> = Vec::new();

    for template in templates {
        interpolated_arguments.push(template.render(context)?);
    }

    Ok(interpolated_arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_interpolates_placeholder() {
        let command = argv(&["apt", "remove", "{package}", "-y"]);
        let templates = get_templates(&command).unwrap();
        let context = HashMap::from([("package".to_string(), "nginx".to_string())]);
        let rendered = interpolate_command(&context, &templates).unwrap();
        assert_eq!(rendered, vec!["apt", "remove", "nginx", "-y"]);
    }

    #[test]
    fn test_plain_arguments_untouched() {
        let command = argv(&["apt-get", "update"]);
        let templates = get_templates(&command).unwrap();
        let rendered = interpolate_command(&HashMap::new(), &templates).unwrap();
        assert_eq!(rendered, vec!["apt-get", "update"]);
    }

    #[test]
    fn test_missing_key_is_render_error() {
        let command = argv(&["apt", "install", "{pkg}"]);
        let templates = get_templates(&command).unwrap();
        let context = HashMap::from([("package".to_string(), "nginx".to_string())]);
        let result = interpolate_command(&context, &templates);
        assert!(matches!(result, Err(Error::Render(_))));
    }
}
