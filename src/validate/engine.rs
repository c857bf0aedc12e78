//! The rule engine that checks request values against property descriptors.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::validate::rules::{Location, PropertyDescriptor, Requirement, Rule};
use crate::validate::wrapin::WrapInRegistry;

/// Somewhere request values can be looked up by key and location.
pub trait ValueSource {
    fn lookup(&self, key: &str, location: Location) -> Option<&Value>;
}

/// A flat object; the location is irrelevant.
pub struct MapSource<'a>(pub &'a Map<String, Value>);

impl ValueSource for MapSource<'_> {
    fn lookup(&self, key: &str, _location: Location) -> Option<&Value> {
        self.0.get(key)
    }
}

/// The first rule an input broke.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFailure {
    pub argument: String,
    pub title: String,
    pub rule: String,
    pub message: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidateError {
    #[error("argument {} failed {}: {}", .0.argument, .0.rule, .0.message)]
    Failure(ValidationFailure),

    #[error("wrap-in {0} does not exist")]
    WrapInNotExists(String),
}

/// Validation collaborator used by the kernel's VALIDATE stage.
pub trait Validate: Send + Sync {
    /// Validate inline argument descriptors, returning the accepted values
    /// keyed by argument name.
    fn validate(
        &self,
        properties: &[PropertyDescriptor],
        source: &dyn ValueSource,
    ) -> Result<Map<String, Value>, ValidateError>;

    /// Validate against a named wrap-in schema.
    fn apply(&self, wrapin: &str, source: &dyn ValueSource) -> Result<Map<String, Value>, ValidateError>;
}

/// Built-in engine: requirement, type coercion, MIN/MAX/IN and nested wrap-ins.
/// Stops at the first failure.
pub struct RuleEngine {
    wrapins: Arc<WrapInRegistry>,
}

impl RuleEngine {
    pub fn new(wrapins: Arc<WrapInRegistry>) -> Self {
        Self { wrapins }
    }

    fn check(
        &self,
        prop: &PropertyDescriptor,
        source: &dyn ValueSource,
    ) -> Result<Option<Value>, ValidateError> {
        let found = prop
            .keys()
            .find_map(|key| source.lookup(key, prop.location))
            .filter(|v| !is_blank(v));

        let Some(raw) = found.cloned().or_else(|| prop.default.clone()) else {
            let required = match &prop.requirement {
                Requirement::Always => true,
                Requirement::Never => false,
                Requirement::IfHas(field) => present(source, field),
                Requirement::IfNo(field) => !present(source, field),
            };
            if required {
                return Err(fail(prop, "NEED", "is required", Value::Null));
            }
            return Ok(None);
        };

        let value = prop
            .ty
            .cast(&raw)
            .ok_or_else(|| fail(prop, "TYPE", "has the wrong type", raw.clone()))?;

        for rule in &prop.rules {
            match rule {
                Rule::Min(bound) => {
                    if measure(&value).is_some_and(|m| m < *bound) {
                        return Err(fail(prop, "MIN", &format!("must be at least {bound}"), value));
                    }
                }
                Rule::Max(bound) => {
                    if measure(&value).is_some_and(|m| m > *bound) {
                        return Err(fail(prop, "MAX", &format!("must be at most {bound}"), value));
                    }
                }
                Rule::In(allowed) => {
                    let text = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
                    if !allowed.iter().any(|a| *a == text) {
                        return Err(fail(prop, "IN", "is not an allowed value", value));
                    }
                }
                Rule::WrapIn { schema, list } => {
                    return self.nested(prop, schema, *list, value).map(Some);
                }
            }
        }
        Ok(Some(value))
    }

    fn nested(
        &self,
        prop: &PropertyDescriptor,
        schema: &str,
        list: bool,
        value: Value,
    ) -> Result<Value, ValidateError> {
        if !list {
            let Value::Object(map) = &value else {
                return Err(fail(prop, "WRAPIN", "must be an object", value));
            };
            return self.apply(schema, &MapSource(map)).map(Value::Object);
        }
        let Value::Array(items) = &value else {
            return Err(fail(prop, "WRAPIN", "must be a list of objects", value));
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let Value::Object(map) = item else {
                return Err(fail(prop, "WRAPIN", "must be a list of objects", item.clone()));
            };
            out.push(Value::Object(self.apply(schema, &MapSource(map))?));
        }
        Ok(Value::Array(out))
    }
}

impl Validate for RuleEngine {
    fn validate(
        &self,
        properties: &[PropertyDescriptor],
        source: &dyn ValueSource,
    ) -> Result<Map<String, Value>, ValidateError> {
        let mut accepted = Map::new();
        for prop in properties {
            if let Some(value) = self.check(prop, source)? {
                accepted.insert(prop.name.clone(), value);
            }
        }
        Ok(accepted)
    }

    fn apply(&self, wrapin: &str, source: &dyn ValueSource) -> Result<Map<String, Value>, ValidateError> {
        let schema = self
            .wrapins
            .get(wrapin)
            .ok_or_else(|| ValidateError::WrapInNotExists(wrapin.to_string()))?;
        self.validate(&schema.properties, source)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn present(source: &dyn ValueSource, field: &str) -> bool {
    source.lookup(field, Location::All).is_some_and(|v| !is_blank(v))
}

fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        Value::Object(map) => Some(map.len() as f64),
        _ => None,
    }
}

fn fail(prop: &PropertyDescriptor, rule: &str, default_message: &str, value: Value) -> ValidateError {
    let message = prop
        .messages
        .get(rule)
        .cloned()
        .unwrap_or_else(|| format!("{} {}", prop.title, default_message));
    ValidateError::Failure(ValidationFailure {
        argument: prop.name.clone(),
        title: prop.title.clone(),
        rule: rule.to_string(),
        message,
        value,
    })
}
