//! Handler registration and the call context handed to handler methods.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::http::request::Request;
use crate::http::response::Response;
use crate::pipeline::context::RouteContext;
use crate::pipeline::stage::Flow;
use crate::port::view::PortView;
use crate::BoxError;

/// A page of results plus the numbers needed to describe it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub list: Vec<Value>,
    pub page: u64,
    pub size: u64,
    pub total: u64,
}

impl Page {
    pub fn new(list: Vec<Value>, page: u64, size: u64, total: u64) -> Self {
        Self {
            list,
            page,
            size,
            total,
        }
    }

    /// Paginator metadata for the response envelope.
    pub fn meta(&self) -> Value {
        json!({
            "page": self.page,
            "size": self.size,
            "count": self.list.len(),
            "total": self.total,
        })
    }
}

/// What a handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Data(Value),
    Page(Page),
}

impl Output {
    pub fn into_value(self) -> Value {
        match self {
            Output::Data(value) => value,
            Output::Page(page) => Value::Array(page.list),
        }
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Output::Data(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("missing field {0}")]
    Missing(String),

    #[error("cannot bind arguments: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Everything a handler method can see and touch for one request.
pub struct PortCall<'a> {
    pub request: &'a Request,
    pub response: &'a mut Response,
    pub route: &'a RouteContext,
    pub port: &'a PortView,
}

impl PortCall<'_> {
    /// A validated argument, else a route parameter.
    pub fn value(&self, name: &str) -> Option<Value> {
        self.route
            .argument(name)
            .cloned()
            .or_else(|| self.route.params().get(name).map(|p| Value::String(p.to_string())))
    }

    /// Collect the named fields; fails on the first one that is absent.
    pub fn fields(&self, names: &[&str]) -> Result<Map<String, Value>, BindError> {
        names
            .iter()
            .map(|name| {
                self.value(name)
                    .map(|v| (name.to_string(), v))
                    .ok_or_else(|| BindError::Missing(name.to_string()))
            })
            .collect()
    }

    /// Deserialize route parameters and validated arguments into `T`.
    /// Arguments win over parameters of the same name.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        let mut merged: Map<String, Value> = self
            .route
            .params()
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        for (k, v) in self.route.arguments() {
            merged.insert(k.clone(), v.clone());
        }
        Ok(serde_json::from_value(Value::Object(merged))?)
    }

    /// Result of an inbound pipe.
    pub fn stashed(&self, pipe: &str) -> Option<&Value> {
        self.route.stashed(pipe)
    }
}

/// A routable handler method.
pub trait PortMethod: Send + Sync {
    fn call(&self, call: &mut PortCall<'_>, args: Vec<Value>) -> Result<Flow<Output>, BoxError>;
}

impl<F> PortMethod for F
where
    F: Fn(&mut PortCall<'_>, Vec<Value>) -> Result<Flow<Output>, BoxError> + Send + Sync,
{
    fn call(&self, call: &mut PortCall<'_>, args: Vec<Value>) -> Result<Flow<Output>, BoxError> {
        self(call, args)
    }
}

/// Tells the assembler which classes are handler-eligible.
pub trait PortCatalog {
    fn contains(&self, class: &str) -> bool;
}

/// Trusts the metadata source: every declared port class is eligible.
/// Used by offline tooling that has no handlers at hand.
pub struct DeclaredPorts;

impl PortCatalog for DeclaredPorts {
    fn contains(&self, _class: &str) -> bool {
        true
    }
}

/// Handler methods by class and method name.
#[derive(Default)]
pub struct PortTable {
    classes: HashMap<String, HashMap<String, Arc<dyn PortMethod>>>,
}

impl PortTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, class: &str, method: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut PortCall<'_>, Vec<Value>) -> Result<Flow<Output>, BoxError> + Send + Sync + 'static,
    {
        self.register_method(class, method, Arc::new(handler))
    }

    pub fn register_method(&mut self, class: &str, method: &str, handler: Arc<dyn PortMethod>) -> &mut Self {
        self.classes
            .entry(class.to_string())
            .or_default()
            .insert(method.to_string(), handler);
        self
    }

    pub fn get(&self, class: &str, method: &str) -> Option<&Arc<dyn PortMethod>> {
        self.classes.get(class)?.get(method)
    }
}

impl PortCatalog for PortTable {
    fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }
}
