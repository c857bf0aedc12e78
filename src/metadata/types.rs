//! Parsed per-class, per-method and per-property metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value annotations attached to a class, method or property.
///
/// Keys are compared case-insensitively. Annotation parameters (for example
/// `ROUTE(EXTENDS=false)` or per-argument rule overrides) live in `extra`,
/// keyed by the annotation they belong to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    #[serde(rename = "_extra", default)]
    pub extra: BTreeMap<String, Value>,

    #[serde(flatten)]
    pub values: BTreeMap<String, Value>,
}

impl DocMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_ascii_uppercase(), value.into());
        self
    }

    pub fn with_extra(mut self, annotation: &str, params: impl Into<Value>) -> Self {
        self.extra.insert(annotation.to_ascii_uppercase(), params.into());
        self
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        lookup(&self.values, key).filter(|v| !v.is_null())
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(Value::as_str)
    }

    /// True when the annotation is present and not an explicit "off" value.
    pub fn flag(&self, key: &str) -> bool {
        match self.value(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64() != Some(0),
            Some(Value::String(s)) => !matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "" | "0" | "false" | "no" | "off"
            ),
            Some(_) => true,
            None => false,
        }
    }

    pub fn extra(&self, annotation: &str) -> Option<&Value> {
        lookup(&self.extra, annotation)
    }

    /// One parameter of an annotation, e.g. `extra_param("ROUTE", "EXTENDS")`.
    pub fn extra_param(&self, annotation: &str, param: &str) -> Option<&Value> {
        self.extra(annotation)?
            .as_object()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(param))
            .map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

fn lookup<'a>(map: &'a BTreeMap<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// What a class is declared as by the metadata source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    #[default]
    Port,
    WrapIn,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMeta {
    /// Fully qualified class name, unique across the application.
    pub namespace: String,

    /// Domain that owns the class; selects the domain-local configuration.
    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub kind: ClassKind,

    #[serde(default)]
    pub doc: DocMeta,
}

/// A positional parameter declared by a handler method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamMeta {
    pub name: String,

    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodMeta {
    pub name: String,

    #[serde(default = "default_public")]
    pub public: bool,

    #[serde(default)]
    pub parameters: Vec<ParamMeta>,

    #[serde(default)]
    pub doc: DocMeta,
}

fn default_public() -> bool {
    true
}

impl MethodMeta {
    pub fn new(name: impl Into<String>, doc: DocMeta) -> Self {
        Self {
            name: name.into(),
            public: true,
            parameters: Vec::new(),
            doc,
        }
    }

    pub fn param(mut self, name: &str) -> Self {
        self.parameters.push(ParamMeta {
            name: name.to_string(),
            default: None,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyMeta {
    pub name: String,

    #[serde(default)]
    pub doc: DocMeta,
}

/// The three metadata bundles of one declared class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerMeta {
    pub class: ClassMeta,

    #[serde(default)]
    pub properties: Vec<PropertyMeta>,

    #[serde(default)]
    pub methods: Vec<MethodMeta>,
}

impl HandlerMeta {
    pub fn port(namespace: &str, domain: &str, doc: DocMeta) -> Self {
        Self {
            class: ClassMeta {
                namespace: namespace.to_string(),
                domain: domain.to_string(),
                kind: ClassKind::Port,
                doc,
            },
            ..Self::default()
        }
    }

    pub fn wrapin(namespace: &str, doc: DocMeta) -> Self {
        Self {
            class: ClassMeta {
                namespace: namespace.to_string(),
                domain: String::new(),
                kind: ClassKind::WrapIn,
                doc,
            },
            ..Self::default()
        }
    }

    pub fn property(mut self, name: &str, doc: DocMeta) -> Self {
        self.properties.push(PropertyMeta {
            name: name.to_string(),
            doc,
        });
        self
    }

    pub fn method(mut self, method: MethodMeta) -> Self {
        self.methods.push(method);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_doc_lookup_is_case_insensitive() {
        let doc = DocMeta::new()
            .with("route", "users")
            .with_extra("Route", json!({"extends": false}));
        assert_eq!(doc.text("ROUTE"), Some("users"));
        assert_eq!(doc.extra_param("ROUTE", "EXTENDS"), Some(&json!(false)));
    }

    #[test]
    fn test_flag_values() {
        let doc = DocMeta::new()
            .with("A", "1")
            .with("B", "false")
            .with("C", true)
            .with("D", 0);
        assert!(doc.flag("A"));
        assert!(!doc.flag("B"));
        assert!(doc.flag("C"));
        assert!(!doc.flag("D"));
        assert!(!doc.flag("MISSING"));
    }

    #[test]
    fn test_handler_meta_deserializes_extra() {
        let raw = json!({
            "class": {"namespace": "Shop\\Port\\Item", "domain": "shop", "doc": {"ROUTE": "items"}},
            "methods": [{
                "name": "show",
                "parameters": [{"name": "id"}],
                "doc": {"TITLE": "Show", "VERB": "GET", "_extra": {"ROUTE": {"EXTENDS": true}}}
            }]
        });
        let meta: HandlerMeta = serde_json::from_value(raw).unwrap();
        assert_eq!(meta.class.kind, ClassKind::Port);
        assert!(meta.methods[0].public);
        assert_eq!(meta.methods[0].doc.text("title"), Some("Show"));
        assert!(meta.methods[0].doc.extra("ROUTE").is_some());
    }
}
