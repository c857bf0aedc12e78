//! API documentation projected from the registry.
//!
//! # Data Flow
//! ```text
//! Registry ports (NODOC skipped)
//!     → version ("_" when unversioned)
//!     → domain (titled from config)
//!     → GROUP path, outermost first (titled from config)
//!     → DocEntry
//! ```
//!
//! [`DocGroup::categories`] flattens a tree into the category listing used by
//! API consoles, one entry per verb, skipping NODUMP ports.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::KernelConfig;
use crate::http::verb::Verb;
use crate::port::PortDescriptor;
use crate::routing::registry::Registry;
use crate::routing::template::PathTemplate;

/// Version key used for ports without VERSION.
pub const UNVERSIONED: &str = "_";

/// Documentation of one port.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocEntry {
    pub title: String,
    pub target: String,
    pub route: String,
    pub verbs: Vec<Verb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapin: Option<String>,
    pub arguments: BTreeMap<String, Map<String, Value>>,
    #[serde(skip)]
    nodump: bool,
}

impl DocEntry {
    fn from_port(port: &PortDescriptor) -> Self {
        Self {
            title: port.title.clone(),
            target: port.target(),
            route: PathTemplate::parse(&port.route).url(),
            verbs: port.verbs.clone(),
            notes: port.notes.clone(),
            author: port.settings.author.clone(),
            status: port.settings.status.clone(),
            wrapin: port.settings.wrapin.clone(),
            arguments: port
                .arguments
                .iter()
                .map(|a| (a.name.clone(), a.to_summary()))
                .collect(),
            nodump: port.settings.nodump,
        }
    }
}

/// A titled node: ports placed directly here plus nested groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocGroup {
    pub title: String,
    pub groups: BTreeMap<String, DocGroup>,
    pub list: Vec<DocEntry>,
}

impl DocGroup {
    fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    fn insert(&mut self, path: &[(String, String)], entry: DocEntry) {
        match path.split_first() {
            None => self.list.push(entry),
            Some(((name, title), rest)) => self
                .groups
                .entry(name.clone())
                .or_insert_with(|| DocGroup::titled(title))
                .insert(rest, entry),
        }
    }

    fn sort(&mut self) {
        self.list
            .sort_by(|a, b| (&a.route, &a.target).cmp(&(&b.route, &b.target)));
        self.groups.values_mut().for_each(DocGroup::sort);
    }

    /// Nested groups as categories.
    pub fn categories(&self) -> Vec<Category> {
        self.groups.values().map(Category::from_group).collect()
    }
}

/// One category of the console listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub title: String,
    pub categories: Vec<Category>,
    pub apis: Vec<ApiEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiEntry {
    pub title: String,
    pub route: String,
    pub verb: Verb,
}

impl Category {
    fn from_group(group: &DocGroup) -> Self {
        let apis = group
            .list
            .iter()
            .filter(|entry| !entry.nodump)
            .flat_map(|entry| {
                entry.verbs.iter().map(|verb| ApiEntry {
                    title: entry.title.clone(),
                    route: entry.route.clone(),
                    verb: *verb,
                })
            })
            .collect();
        Self {
            title: group.title.clone(),
            categories: group.categories(),
            apis,
        }
    }
}

/// Version → domain → documentation tree.
pub type Docs = BTreeMap<String, BTreeMap<String, DocGroup>>;

impl Registry {
    pub fn docs(&self, config: &KernelConfig) -> Docs {
        let mut docs = Docs::new();
        for port in self.ports().filter(|p| !p.settings.nodoc) {
            let version = port
                .settings
                .version
                .clone()
                .unwrap_or_else(|| UNVERSIONED.to_string());
            let domain = port.domain.as_str();
            let path: Vec<(String, String)> = port
                .settings
                .group
                .iter()
                .map(|g| {
                    let title = config.group_title(domain, g).unwrap_or(g);
                    (g.clone(), title.to_string())
                })
                .collect();

            docs.entry(version)
                .or_default()
                .entry(domain.to_string())
                .or_insert_with(|| DocGroup::titled(config.domain_title(domain).unwrap_or(domain)))
                .insert(&path, DocEntry::from_port(port));
        }
        docs.values_mut()
            .flat_map(|domains| domains.values_mut())
            .for_each(DocGroup::sort);
        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainConfig;
    use crate::port::PortSettings;
    use crate::routing::RegistryBuilder;
    use std::collections::BTreeMap;

    fn port(method: &str, route: &str, settings: PortSettings) -> PortDescriptor {
        PortDescriptor {
            class: "Shop\\Port\\Order".into(),
            method: method.into(),
            domain: "shop".into(),
            title: format!("Order {method}"),
            notes: None,
            route: route.into(),
            verbs: vec![Verb::Get, Verb::Head],
            settings,
            arguments: Vec::new(),
            parameters: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    fn config() -> KernelConfig {
        let mut config = KernelConfig::default();
        let mut shop = DomainConfig {
            title: Some("Shop".into()),
            ..DomainConfig::default()
        };
        shop.groups.insert("orders".into(), "Orders".into());
        config.domains.insert("shop".into(), shop);
        config
    }

    #[test]
    fn test_docs_tree_groups_and_skips_nodoc() {
        let mut builder = RegistryBuilder::new(8);
        builder.register_port(port(
            "list",
            "v1/orders",
            PortSettings {
                version: Some("v1".into()),
                group: vec!["orders".into(), "admin".into()],
                ..PortSettings::default()
            },
        ));
        builder.register_port(port("ping", "ping", PortSettings::default()));
        builder.register_port(port(
            "secret",
            "secret",
            PortSettings {
                nodoc: true,
                ..PortSettings::default()
            },
        ));
        let docs = builder.seal().docs(&config());

        let unversioned = &docs[UNVERSIONED]["shop"];
        assert_eq!(unversioned.title, "Shop");
        assert_eq!(unversioned.list.len(), 1);
        assert_eq!(unversioned.list[0].target, "Shop\\Port\\Order@ping");

        let v1 = &docs["v1"]["shop"];
        let orders = &v1.groups["orders"];
        assert_eq!(orders.title, "Orders");
        assert!(orders.list.is_empty());
        assert_eq!(orders.groups["admin"].title, "admin");
        assert_eq!(orders.groups["admin"].list[0].route, "/v1/orders");
    }

    #[test]
    fn test_categories_one_api_per_verb_without_nodump() {
        let mut builder = RegistryBuilder::new(8);
        let grouped = |nodump| PortSettings {
            group: vec!["orders".into()],
            nodump,
            ..PortSettings::default()
        };
        builder.register_port(port("list", "orders", grouped(false)));
        builder.register_port(port("audit", "orders/audit", grouped(true)));
        let docs = builder.seal().docs(&config());

        let categories = docs[UNVERSIONED]["shop"].categories();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].title, "Orders");
        let verbs: Vec<Verb> = categories[0].apis.iter().map(|a| a.verb).collect();
        assert_eq!(verbs, vec![Verb::Get, Verb::Head]);
        assert!(categories[0].apis.iter().all(|a| a.route == "/orders"));
    }
}
