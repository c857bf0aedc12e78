//! Response envelopes (WRAPOUT / WRAPERR).
//!
//! A wrapper is a pair of templates: one for successful results, one for
//! error bodies. Each template is an ordered list of fields; every field is
//! filled from a slot (the data itself, the status code, the info text, the
//! paginator) or from the response context by key.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Where a wrapper field takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// The result (out) or the error detail (err).
    Data,
    /// CODEOK (out) or the error code (err).
    Code,
    /// INFOOK (out) or the error name (err).
    Info,
    /// Pagination metadata added by the response-support pipe.
    Paginator,
    /// Response context entry named by the field key.
    #[default]
    Context,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrapperField {
    pub key: String,

    #[serde(default)]
    pub slot: Slot,

    /// Used when a context field is absent.
    #[serde(default)]
    pub default: Value,
}

impl WrapperField {
    pub fn new(key: &str, slot: Slot) -> Self {
        Self {
            key: key.to_string(),
            slot,
            default: Value::Null,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wrapper {
    #[serde(default)]
    pub out: Vec<WrapperField>,

    #[serde(default)]
    pub err: Vec<WrapperField>,
}

impl Wrapper {
    /// Wrap a successful result.
    pub fn wrap_out(&self, data: Value, code: Option<i64>, info: Option<&str>, context: &Map<String, Value>) -> Value {
        if self.out.is_empty() {
            return data;
        }
        let mut data = Some(data);
        let mut body = Map::new();
        for field in &self.out {
            let value = match field.slot {
                Slot::Data => data.take().unwrap_or(Value::Null),
                Slot::Code => json!(code.unwrap_or(0)),
                Slot::Info => json!(info.unwrap_or("ok")),
                Slot::Paginator => context.get("paginator").cloned().unwrap_or(Value::Null),
                Slot::Context => context.get(&field.key).cloned().unwrap_or_else(|| field.default.clone()),
            };
            body.insert(field.key.clone(), value);
        }
        Value::Object(body)
    }

    /// Wrap an error body.
    pub fn wrap_err(&self, code: i64, name: &str, detail: Value, context: &Map<String, Value>) -> Value {
        if self.err.is_empty() {
            return json!([code, name, detail]);
        }
        let mut detail = Some(detail);
        let mut body = Map::new();
        for field in &self.err {
            let value = match field.slot {
                Slot::Data => detail.take().unwrap_or(Value::Null),
                Slot::Code => json!(code),
                Slot::Info => json!(name),
                Slot::Paginator => Value::Null,
                Slot::Context => context.get(&field.key).cloned().unwrap_or_else(|| field.default.clone()),
            };
            body.insert(field.key.clone(), value);
        }
        Value::Object(body)
    }
}

/// Named wrappers: the built-ins plus any defined in configuration.
#[derive(Debug, Clone)]
pub struct WrapperRegistry {
    wrappers: BTreeMap<String, Arc<Wrapper>>,
}

impl WrapperRegistry {
    /// `classic`, `http` and `action_only`.
    pub fn builtin() -> Self {
        let classic_err = vec![
            WrapperField::new("code", Slot::Code),
            WrapperField::new("info", Slot::Info),
            WrapperField::new("more", Slot::Data),
        ];

        let mut wrappers = BTreeMap::new();
        wrappers.insert(
            "classic".to_string(),
            Arc::new(Wrapper {
                out: vec![
                    WrapperField::new("code", Slot::Code),
                    WrapperField::new("info", Slot::Info),
                    WrapperField::new("data", Slot::Data),
                    WrapperField::new("paginator", Slot::Paginator),
                ],
                err: classic_err.clone(),
            }),
        );
        wrappers.insert(
            "http".to_string(),
            Arc::new(Wrapper {
                out: vec![
                    WrapperField::new("data", Slot::Data),
                    WrapperField::new("meta", Slot::Paginator),
                ],
                err: vec![
                    WrapperField::new("error", Slot::Info),
                    WrapperField::new("status", Slot::Code),
                    WrapperField::new("trace", Slot::Data),
                ],
            }),
        );
        wrappers.insert(
            "action_only".to_string(),
            Arc::new(Wrapper {
                out: vec![
                    WrapperField::new("code", Slot::Code),
                    WrapperField::new("info", Slot::Info),
                ],
                err: classic_err,
            }),
        );
        Self { wrappers }
    }

    /// Built-ins overlaid with configured wrappers; configuration wins on name clashes.
    pub fn with_config(config: &BTreeMap<String, Wrapper>) -> Self {
        let mut registry = Self::builtin();
        for (name, wrapper) in config {
            registry.insert(name, wrapper.clone());
        }
        registry
    }

    pub fn insert(&mut self, name: &str, wrapper: Wrapper) {
        self.wrappers.insert(name.to_string(), Arc::new(wrapper));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Wrapper>> {
        self.wrappers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.wrappers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.wrappers.keys().map(String::as_str)
    }
}

impl Default for WrapperRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
