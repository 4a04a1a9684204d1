//! Connection-string template rendering.
//!
//! Templates carry `{{ .field }}` placeholders that are substituted
//! literally from a credential map. Unknown placeholders are an error,
//! never silently dropped.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder: {0}")]
    UnknownPlaceholder(String),

    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),
}

/// Render a template against a field map.
///
/// Whitespace inside the braces is insignificant; the leading `.` on
/// field names is optional.
pub fn render(template: &str, values: &HashMap<&str, &str>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = match after.find("}}") {
            Some(end) => end,
            None => {
                let offset = template.len() - rest.len() + start;
                return Err(TemplateError::Unterminated(offset));
            }
        };

        let raw = after[..end].trim();
        let field = raw.strip_prefix('.').unwrap_or(raw);
        match values.get(field) {
            Some(value) => out.push_str(value),
            None => return Err(TemplateError::UnknownPlaceholder(field.to_string())),
        }

        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> HashMap<&'static str, &'static str> {
        HashMap::from([("username", "someuser"), ("password", "p@ssw0rd")])
    }

    #[test]
    fn substitutes_credentials() {
        let rendered = render(
            "postgresql://{{ .username }}:{{ .password }}@postgresql:5432/schema",
            &creds(),
        )
        .unwrap();
        assert_eq!(rendered, "postgresql://someuser:p@ssw0rd@postgresql:5432/schema");
    }

    #[test]
    fn template_without_placeholders_passes_through() {
        assert_eq!(
            render("postgresql://static:uri@db/x", &creds()).unwrap(),
            "postgresql://static:uri@db/x"
        );
    }

    #[test]
    fn whitespace_inside_braces_is_insignificant() {
        assert_eq!(render("{{.username}}", &creds()).unwrap(), "someuser");
        assert_eq!(render("{{   .username   }}", &creds()).unwrap(), "someuser");
    }

    #[test]
    fn leading_dot_is_optional() {
        assert_eq!(render("{{ username }}", &creds()).unwrap(), "someuser");
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let err = render("{{ .database }}", &creds()).unwrap_err();
        assert_eq!(err, TemplateError::UnknownPlaceholder("database".to_string()));
    }

    #[test]
    fn unterminated_placeholder_is_an_error() {
        let err = render("postgresql://{{ .username", &creds()).unwrap_err();
        assert_eq!(err, TemplateError::Unterminated(13));
    }

    #[test]
    fn adjacent_placeholders_render_in_order() {
        assert_eq!(
            render("{{ .username }}{{ .password }}", &creds()).unwrap(),
            "someuserp@ssw0rd"
        );
    }
}
