//! Request path → route resolution.
//!
//! # Data Flow
//! ```text
//! (path, verb)
//!     → normalize (strip slashes, "/" for root)
//!     → exact lookup on the key
//!     → suffix: strip ".alias", exact lookup, gated by the port's SUFFIX
//!     → parameterised: substitute "?" into segments, fewest first
//!     → Match { RouteEntry, PortDescriptor } or None
//! ```
//!
//! # Design Decisions
//! - Exact routes always beat parameterised ones
//! - Among parameterised candidates, fewer substitutions win; ties go to
//!   candidates that substitute later segments
//! - A suffix that the first matching port does not accept ends the search
//! - Paths longer than `max_param_segments` only get exact and suffix lookups

use std::sync::Arc;

use serde::Serialize;

use crate::http::mime;
use crate::http::verb::Verb;
use crate::port::PortDescriptor;
use crate::routing::registry::{Registry, RouteDef};
use crate::routing::template::{self, PLACEHOLDER, ROOT};

/// Placeholder values of a matched route, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteParams(Vec<(String, String)>);

impl RouteParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for RouteParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The route resolved for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub class: String,
    pub method: String,
    pub verb: Verb,
    /// Template as declared (`users/{id}`).
    pub definition: String,
    /// Normalised request path with any suffix removed.
    pub url_path: String,
    /// MIME alias the path ended with, when the port accepted it.
    pub suffix: Option<String>,
    pub params: RouteParams,
}

impl RouteEntry {
    pub fn target(&self) -> String {
        format!("{}@{}", self.class, self.method)
    }
}

#[derive(Debug, Clone)]
pub struct Match {
    pub route: RouteEntry,
    pub port: Arc<PortDescriptor>,
}

impl Registry {
    /// Resolve a request path and verb to a route and its port.
    pub fn find(&self, path: &str, verb: Verb) -> Option<Match> {
        let key = template::normalize(path);
        // A literal "?" segment reaches placeholder keys; only static
        // templates may answer the exact lookups.
        if let Some(def) = self.static_route(&key, verb) {
            return self.bind(def, verb, key, None, Vec::new());
        }

        let mut suffix = None;
        let mut base = key;
        if let Some((alias, stripped)) = strip_suffix(&base) {
            if let Some(def) = self.static_route(&stripped, verb) {
                let port = self.port(&def.class, &def.method)?;
                if !port.accepts_suffix(alias) {
                    tracing::debug!(path, suffix = alias, "Suffix not accepted by route");
                    return None;
                }
                return self.bind(def, verb, stripped, Some(alias), Vec::new());
            }
            suffix = Some(alias);
            base = stripped;
        }

        self.find_parameterized(&base, verb, suffix)
    }

    fn static_route(&self, key: &str, verb: Verb) -> Option<&RouteDef> {
        self.route(key, verb)
            .map(Arc::as_ref)
            .filter(|def| def.template.placeholders().is_empty())
    }

    fn find_parameterized(&self, key: &str, verb: Verb, suffix: Option<&str>) -> Option<Match> {
        if key == ROOT {
            return None;
        }
        let segments: Vec<&str> = template::segments(key).collect();
        let count = segments.len();
        if count > self.max_param_segments {
            return None;
        }
        let max_placeholders = *self.shapes.get(&(count, verb))?;

        // Bit i of a mask substitutes the i-th segment counted from the end.
        for substitutions in 1..=max_placeholders.min(count) {
            for mask in masks(count, substitutions) {
                let mut candidate = segments.clone();
                let mut values = Vec::with_capacity(substitutions);
                for (pos, segment) in candidate.iter_mut().enumerate() {
                    if mask & (1u64 << (count - 1 - pos)) != 0 {
                        values.push(segment.to_string());
                        *segment = PLACEHOLDER;
                    }
                }
                let Some(def) = self.route(&candidate.join("/"), verb) else {
                    continue;
                };
                let port = self.port(&def.class, &def.method)?;
                if let Some(alias) = suffix {
                    if !port.accepts_suffix(alias) {
                        tracing::debug!(path = key, suffix = alias, "Suffix not accepted by route");
                        return None;
                    }
                }
                if def.template.placeholders().len() != values.len() {
                    continue;
                }
                return self.bind(def, verb, key.to_string(), suffix, values);
            }
        }
        None
    }

    fn bind(
        &self,
        def: &RouteDef,
        verb: Verb,
        url_path: String,
        suffix: Option<&str>,
        values: Vec<String>,
    ) -> Option<Match> {
        let port = self.port(&def.class, &def.method)?.clone();
        let params = def
            .template
            .placeholders()
            .iter()
            .cloned()
            .zip(values)
            .collect();
        Some(Match {
            route: RouteEntry {
                class: def.class.clone(),
                method: def.method.clone(),
                verb,
                definition: def.template.definition().to_string(),
                url_path,
                suffix: suffix.map(str::to_string),
                params: RouteParams(params),
            },
            port,
        })
    }
}

/// The first MIME alias (in alias-table order) the key ends with as `.alias`.
fn strip_suffix(key: &str) -> Option<(&'static str, String)> {
    mime::aliases().find_map(|alias| {
        let stripped = key.strip_suffix(alias)?.strip_suffix('.')?;
        (!stripped.is_empty() && !stripped.ends_with('/')).then(|| (alias, stripped.to_string()))
    })
}

/// Masks over `width` bits with exactly `ones` bits set, ascending.
fn masks(width: usize, ones: usize) -> impl Iterator<Item = u64> {
    let limit = 1u64 << width;
    let first = (1u64 << ones) - 1;
    std::iter::successors((ones > 0 && ones <= width).then_some(first), move |&mask| {
        // Gosper's hack: next integer with the same popcount.
        let low = mask & mask.wrapping_neg();
        let ripple = mask + low;
        let next = (((ripple ^ mask) >> 2) / low) | ripple;
        (next < limit).then_some(next)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_ascending_by_popcount() {
        assert_eq!(masks(3, 1).collect::<Vec<_>>(), [0b001, 0b010, 0b100]);
        assert_eq!(masks(3, 2).collect::<Vec<_>>(), [0b011, 0b101, 0b110]);
        assert_eq!(masks(2, 2).collect::<Vec<_>>(), [0b11]);
        assert_eq!(masks(2, 3).count(), 0);
    }

    #[test]
    fn test_strip_suffix() {
        assert_eq!(strip_suffix("users/42.json"), Some(("json", "users/42".to_string())));
        assert_eq!(strip_suffix("users/.json"), None);
        assert_eq!(strip_suffix("users/42json"), None);
        assert_eq!(strip_suffix("users"), None);
    }

    #[test]
    fn test_route_params_lookup() {
        let params = RouteParams(vec![("id".into(), "42".into())]);
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.len(), 1);
    }
}
