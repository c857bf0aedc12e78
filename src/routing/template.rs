//! Path templates and path normalisation.
//!
//! A template such as `v1/users/{id}/posts` is indexed under a key with every
//! placeholder segment replaced by `?` (`v1/users/?/posts`). Request paths
//! are normalised the same way (no leading or trailing slash, no empty
//! segments), so an exact lookup is a single hash probe.

use serde::Serialize;

/// Stands in for a placeholder segment in route keys.
pub const PLACEHOLDER: &str = "?";

/// Key of the root path.
pub const ROOT: &str = "/";

/// Normalise a path into a route key.
pub fn normalize(path: &str) -> String {
    let key = segments(path).collect::<Vec<_>>().join("/");
    if key.is_empty() {
        ROOT.to_string()
    } else {
        key
    }
}

/// Non-empty path segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// A parsed route template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathTemplate {
    /// The template as declared, normalised (`users/{id}`).
    definition: String,
    /// Lookup key (`users/?`).
    key: String,
    /// Placeholder names in declaration order.
    placeholders: Vec<String>,
}

impl PathTemplate {
    /// Parse a route expression. Only whole segments of the form `{name}`
    /// are placeholders.
    pub fn parse(expression: &str) -> Self {
        let mut placeholders = Vec::new();
        let mut definition = Vec::new();
        let mut key = Vec::new();
        for segment in segments(expression) {
            definition.push(segment);
            match placeholder_name(segment) {
                Some(name) => {
                    placeholders.push(name.to_string());
                    key.push(PLACEHOLDER);
                }
                None => key.push(segment),
            }
        }
        let join = |parts: Vec<&str>| {
            if parts.is_empty() {
                ROOT.to_string()
            } else {
                parts.join("/")
            }
        };
        Self {
            definition: join(definition),
            key: join(key),
            placeholders,
        }
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// The definition as a URL path (`/users/{id}`).
    pub fn url(&self) -> String {
        if self.definition == ROOT {
            ROOT.to_string()
        } else {
            format!("/{}", self.definition)
        }
    }
}

fn placeholder_name(segment: &str) -> Option<&str> {
    let name = segment.strip_prefix('{')?.strip_suffix('}')?.trim();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/users//42/"), "users/42");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("///"), "/");
    }

    #[test]
    fn test_parse_placeholders() {
        let template = PathTemplate::parse("/v1/users/{id}/posts/{post_id}");
        assert_eq!(template.key(), "v1/users/?/posts/?");
        assert_eq!(template.definition(), "v1/users/{id}/posts/{post_id}");
        assert_eq!(template.placeholders(), ["id", "post_id"]);
        assert_eq!(template.url(), "/v1/users/{id}/posts/{post_id}");
    }

    #[test]
    fn test_partial_braces_are_literal() {
        let template = PathTemplate::parse("files/{name}.json/{}");
        assert_eq!(template.key(), "files/{name}.json/{}");
        assert!(template.placeholders().is_empty());
    }

    #[test]
    fn test_root_template() {
        let template = PathTemplate::parse("");
        assert_eq!(template.key(), "/");
        assert_eq!(template.url(), "/");
    }
}
