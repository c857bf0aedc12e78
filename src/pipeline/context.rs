//! Request-scoped routing state.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::metadata::PropertyMeta;
use crate::port::PortView;
use crate::routing::{PropertyTable, RouteEntry, RouteParams};

/// The matched route plus the state pipes and validation attach to it.
#[derive(Debug, Clone)]
pub struct RouteContext {
    entry: RouteEntry,
    properties: Option<Arc<PropertyTable>>,
    stash: HashMap<String, Value>,
    arguments: Map<String, Value>,
}

impl RouteContext {
    pub fn new(entry: RouteEntry, properties: Option<Arc<PropertyTable>>) -> Self {
        Self {
            entry,
            properties,
            stash: HashMap::new(),
            arguments: Map::new(),
        }
    }

    pub fn entry(&self) -> &RouteEntry {
        &self.entry
    }

    pub fn params(&self) -> &RouteParams {
        &self.entry.params
    }

    /// Property metadata of the handler class.
    pub fn property(&self, name: &str) -> Option<&PropertyMeta> {
        self.properties.as_ref()?.get(name)
    }

    /// Store an inbound pipe's result under its name.
    pub fn stash(&mut self, pipe: &str, value: Value) {
        self.stash.insert(pipe.to_string(), value);
    }

    pub fn stashed(&self, pipe: &str) -> Option<&Value> {
        self.stash.get(pipe)
    }

    /// Validated arguments, by argument name.
    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    pub(crate) fn set_arguments(&mut self, arguments: Map<String, Value>) {
        self.arguments = arguments;
    }
}

/// A routed request: its route state and its port.
#[derive(Debug, Clone)]
pub struct Routed {
    pub route: RouteContext,
    pub port: PortView,
}
