//! Route and port registry.
//!
//! Built once by the assembler through [`RegistryBuilder`], then sealed into
//! an immutable [`Registry`] that is shared across request workers via `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::http::verb::Verb;
use crate::metadata::PropertyMeta;
use crate::port::PortDescriptor;
use crate::routing::template::{self, PathTemplate, ROOT};

/// Property metadata of one class, by property name.
pub type PropertyTable = BTreeMap<String, PropertyMeta>;

/// A registered (template, verb) → handler binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDef {
    pub class: String,
    pub method: String,
    pub template: PathTemplate,
}

impl RouteDef {
    pub fn target(&self) -> String {
        format!("{}@{}", self.class, self.method)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("route {verb} {key} is already bound to {existing}")]
pub struct DuplicateRoute {
    pub verb: Verb,
    pub key: String,
    pub existing: String,
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    routes: HashMap<String, HashMap<Verb, Arc<RouteDef>>>,
    ports: HashMap<String, HashMap<String, Arc<PortDescriptor>>>,
    properties: HashMap<String, Arc<PropertyTable>>,
    max_param_segments: usize,
}

impl RegistryBuilder {
    /// `max_param_segments` caps how long a path may be and still be tried
    /// against parameterised templates.
    pub fn new(max_param_segments: usize) -> Self {
        Self {
            max_param_segments,
            ..Self::default()
        }
    }

    /// Bind a template under a verb. Each (key, verb) pair is bound once.
    pub fn register_route(
        &mut self,
        template: &PathTemplate,
        verb: Verb,
        class: &str,
        method: &str,
    ) -> Result<(), DuplicateRoute> {
        let verbs = self.routes.entry(template.key().to_string()).or_default();
        if let Some(existing) = verbs.get(&verb) {
            return Err(DuplicateRoute {
                verb,
                key: template.key().to_string(),
                existing: existing.target(),
            });
        }
        verbs.insert(
            verb,
            Arc::new(RouteDef {
                class: class.to_string(),
                method: method.to_string(),
                template: template.clone(),
            }),
        );
        Ok(())
    }

    pub fn register_port(&mut self, descriptor: PortDescriptor) {
        self.ports
            .entry(descriptor.class.clone())
            .or_default()
            .insert(descriptor.method.clone(), Arc::new(descriptor));
    }

    pub fn register_properties(&mut self, class: &str, properties: PropertyTable) {
        self.properties.insert(class.to_string(), Arc::new(properties));
    }

    pub fn seal(self) -> Registry {
        let mut shapes: HashMap<(usize, Verb), usize> = HashMap::new();
        for (key, verbs) in &self.routes {
            for (verb, def) in verbs {
                let count = def.template.placeholders().len();
                if count == 0 {
                    continue;
                }
                let slot = shapes.entry((segment_count(key), *verb)).or_default();
                *slot = (*slot).max(count);
            }
        }
        let registry = Registry {
            routes: self.routes,
            ports: self.ports,
            properties: self.properties,
            shapes,
            max_param_segments: self.max_param_segments,
        };
        tracing::info!(
            routes = registry.route_count(),
            ports = registry.port_count(),
            "Route registry sealed"
        );
        registry
    }
}

fn segment_count(key: &str) -> usize {
    if key == ROOT {
        0
    } else {
        template::segments(key).count()
    }
}

/// Immutable route and port tables.
#[derive(Debug)]
pub struct Registry {
    pub(crate) routes: HashMap<String, HashMap<Verb, Arc<RouteDef>>>,
    ports: HashMap<String, HashMap<String, Arc<PortDescriptor>>>,
    properties: HashMap<String, Arc<PropertyTable>>,
    /// Most placeholders any template has, per (segment count, verb).
    pub(crate) shapes: HashMap<(usize, Verb), usize>,
    pub(crate) max_param_segments: usize,
}

impl Registry {
    pub fn route(&self, key: &str, verb: Verb) -> Option<&Arc<RouteDef>> {
        self.routes.get(key)?.get(&verb)
    }

    pub fn port(&self, class: &str, method: &str) -> Option<&Arc<PortDescriptor>> {
        self.ports.get(class)?.get(method)
    }

    pub fn properties(&self, class: &str) -> Option<Arc<PropertyTable>> {
        self.properties.get(class).cloned()
    }

    /// Every bound (key, verb, route), in no particular order.
    pub fn routes(&self) -> impl Iterator<Item = (&str, Verb, &Arc<RouteDef>)> {
        self.routes
            .iter()
            .flat_map(|(key, verbs)| verbs.iter().map(move |(verb, def)| (key.as_str(), *verb, def)))
    }

    pub fn ports(&self) -> impl Iterator<Item = &Arc<PortDescriptor>> {
        self.ports.values().flat_map(|methods| methods.values())
    }

    pub fn route_count(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn port_count(&self) -> usize {
        self.ports.values().map(HashMap::len).sum()
    }

    pub fn max_param_segments(&self) -> usize {
        self.max_param_segments
    }
}
