//! Route listing for operators.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::http::verb::Verb;
use crate::routing::registry::Registry;

/// One handler method and every verb bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteListing {
    pub route: String,
    pub verbs: Vec<Verb>,
    pub target: String,
    pub title: String,
    pub domain: String,
    pub version: Option<String>,
}

/// Empty lists match everything. A version of `_` selects unversioned routes.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub verbs: Vec<Verb>,
    pub versions: Vec<String>,
    pub domains: Vec<String>,
}

impl ListFilter {
    fn keeps_verb(&self, verb: Verb) -> bool {
        self.verbs.is_empty() || self.verbs.contains(&verb)
    }

    fn keeps_version(&self, version: Option<&str>) -> bool {
        self.versions.is_empty()
            || self.versions.iter().any(|v| match version {
                Some(version) => v.eq_ignore_ascii_case(version),
                None => v == "_",
            })
    }

    fn keeps_domain(&self, domain: &str) -> bool {
        self.domains.is_empty() || self.domains.iter().any(|d| d == domain)
    }
}

impl Registry {
    /// Routes grouped per handler method, sorted by route then target.
    pub fn list(&self, filter: &ListFilter) -> Vec<RouteListing> {
        let mut grouped: BTreeMap<(String, String), RouteListing> = BTreeMap::new();
        for (_, verb, def) in self.routes() {
            if !filter.keeps_verb(verb) {
                continue;
            }
            let Some(port) = self.port(&def.class, &def.method) else {
                continue;
            };
            let version = port.settings.version.as_deref();
            if !filter.keeps_version(version) || !filter.keeps_domain(&port.domain) {
                continue;
            }
            let entry = grouped
                .entry((def.template.url(), def.target()))
                .or_insert_with(|| RouteListing {
                    route: def.template.url(),
                    verbs: Vec::new(),
                    target: def.target(),
                    title: port.title.clone(),
                    domain: port.domain.clone(),
                    version: version.map(str::to_string),
                });
            entry.verbs.push(verb);
        }
        grouped
            .into_values()
            .map(|mut listing| {
                listing.verbs.sort();
                listing
            })
            .collect()
    }
}
