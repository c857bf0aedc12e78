//! Property descriptors: the validation metadata of one named argument.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::metadata::DocMeta;

/// Declared type of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Int,
    /// Integer `>= 0`.
    Uint,
    /// Integer `> 0`.
    Pint,
    Float,
    Bool,
    /// JSON object or array.
    Array,
    /// JSON array, or a comma separated string.
    List,
    /// JSON object.
    Map,
}

impl ArgType {
    /// Supported type names; returns `None` for anything else.
    pub fn parse(name: &str) -> Option<Self> {
        let ty = match name.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => ArgType::String,
            "int" | "integer" => ArgType::Int,
            "uint" => ArgType::Uint,
            "pint" => ArgType::Pint,
            "float" | "number" => ArgType::Float,
            "bool" | "boolean" => ArgType::Bool,
            "array" => ArgType::Array,
            "list" => ArgType::List,
            "map" | "object" => ArgType::Map,
            _ => return None,
        };
        Some(ty)
    }

    /// Coerce a request value into this type.
    pub fn cast(&self, value: &Value) -> Option<Value> {
        match self {
            ArgType::String => match value {
                Value::String(_) => Some(value.clone()),
                Value::Number(n) => Some(Value::String(n.to_string())),
                Value::Bool(b) => Some(Value::String(b.to_string())),
                _ => None,
            },
            ArgType::Int => as_i64(value).map(Value::from),
            ArgType::Uint => as_i64(value).filter(|i| *i >= 0).map(Value::from),
            ArgType::Pint => as_i64(value).filter(|i| *i > 0).map(Value::from),
            ArgType::Float => match value {
                Value::Number(_) => Some(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number),
                _ => None,
            },
            ArgType::Bool => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Some(Value::Bool(false)),
                    Some(1) => Some(Value::Bool(true)),
                    _ => None,
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => Some(Value::Bool(true)),
                    "0" | "false" | "no" | "off" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            ArgType::Array => match value {
                Value::Array(_) | Value::Object(_) => Some(value.clone()),
                _ => None,
            },
            ArgType::List => match value {
                Value::Array(_) => Some(value.clone()),
                Value::String(s) => Some(Value::Array(
                    split_list(s, ',').into_iter().map(Value::String).collect(),
                )),
                _ => None,
            },
            ArgType::Map => match value {
                Value::Object(_) => Some(value.clone()),
                _ => None,
            },
        }
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Split on `sep`, trimming items and dropping empty ones.
pub fn split_list(raw: &str, sep: char) -> Vec<String> {
    raw.split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Where an argument is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Location {
    Route,
    Query,
    Body,
    #[default]
    All,
}

impl Location {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "ROUTE" => Location::Route,
            "QUERY" => Location::Query,
            "BODY" | "POST" => Location::Body,
            _ => Location::All,
        }
    }
}

/// When an argument must be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Requirement {
    /// `NEED`
    Always,
    /// `NEED:0`
    Never,
    /// `NEEDIFHAS:field`
    IfHas(String),
    /// `NEEDIFNO:field`
    IfNo(String),
}

impl Requirement {
    /// Parse a requirement key such as `NEED`, `NEED:0` or `NEEDIFHAS:other`.
    pub fn parse(key: &str) -> Option<Self> {
        let upper = key.trim().to_ascii_uppercase();
        let (name, arg) = match upper.split_once(':') {
            Some((name, _)) => {
                let raw_arg = key.trim().split_once(':').map(|(_, a)| a.trim()).unwrap_or("");
                (name.to_string(), raw_arg.to_string())
            }
            None => (upper, String::new()),
        };
        match name.as_str() {
            "NEED" if arg == "0" => Some(Requirement::Never),
            "NEED" => Some(Requirement::Always),
            "NEEDIFHAS" if !arg.is_empty() => Some(Requirement::IfHas(arg)),
            "NEEDIFNO" if !arg.is_empty() => Some(Requirement::IfNo(arg)),
            _ => None,
        }
    }

    /// Whether a key names a requirement rule at all.
    pub fn is_requirement_key(key: &str) -> bool {
        key.trim().to_ascii_uppercase().starts_with("NEED")
    }
}

/// A value constraint applied after type coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", content = "value", rename_all = "UPPERCASE")]
pub enum Rule {
    /// Lower bound: numeric value, string length or list size.
    Min(f64),
    Max(f64),
    /// Allowed values.
    In(Vec<String>),
    /// Nested structure validated against a wrap-in schema.
    WrapIn { schema: String, list: bool },
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Min(_) => "MIN",
            Rule::Max(_) => "MAX",
            Rule::In(_) => "IN",
            Rule::WrapIn { .. } => "WRAPIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    #[error("property {0} has no title")]
    TitleMissing(String),

    #[error("property {0} has no type")]
    TypeMissing(String),

    #[error("property {name} has unsupported type {ty}")]
    UnsupportedType { name: String, ty: String },

    #[error("property {0} declares more than one requirement rule")]
    MultipleRequirementRules(String),

    #[error("property {name} has invalid rule {rule}: {reason}")]
    InvalidRule {
        name: String,
        rule: String,
        reason: String,
    },
}

/// Validation metadata for one named argument or wrap-in field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub ty: ArgType,
    pub compatibles: Vec<String>,
    pub location: Location,
    pub requirement: Requirement,
    pub rules: Vec<Rule>,
    /// Custom failure messages by rule name (`NEED`, `MIN`, ...).
    pub messages: BTreeMap<String, String>,
    pub default: Option<Value>,
    pub notes: Option<String>,
}

const RESERVED_KEYS: [&str; 6] = ["TITLE", "TYPE", "COMPATIBLE", "LOCATION", "NOTES", "DEFAULT"];

impl PropertyDescriptor {
    /// Build a descriptor from a property's annotations.
    ///
    /// `overrides` are the per-use rule parameters (an object keyed by rule
    /// name); keys starting with `_` are ignored. `fallback` applies when
    /// neither the property nor the overrides declare a requirement.
    pub fn assemble(
        name: &str,
        doc: &DocMeta,
        overrides: Option<&Value>,
        fallback: Requirement,
    ) -> Result<Self, PropertyError> {
        let title = doc
            .text("TITLE")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PropertyError::TitleMissing(name.to_string()))?;
        let ty_name = doc
            .text("TYPE")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PropertyError::TypeMissing(name.to_string()))?;
        let ty = ArgType::parse(ty_name).ok_or_else(|| PropertyError::UnsupportedType {
            name: name.to_string(),
            ty: ty_name.to_string(),
        })?;

        let mut descriptor = PropertyDescriptor {
            name: name.to_string(),
            title: title.to_string(),
            ty,
            compatibles: doc.text("COMPATIBLE").map(|c| split_list(c, ',')).unwrap_or_default(),
            location: doc.text("LOCATION").map(Location::parse).unwrap_or_default(),
            requirement: fallback.clone(),
            rules: Vec::new(),
            messages: BTreeMap::new(),
            default: doc.value("DEFAULT").cloned(),
            notes: doc.text("NOTES").map(str::to_string),
        };

        let mut own_requirement = None;
        for key in doc.keys() {
            if RESERVED_KEYS.iter().any(|r| r.eq_ignore_ascii_case(key)) {
                continue;
            }
            let value = doc.value(key).cloned().unwrap_or(Value::Null);
            if Requirement::is_requirement_key(key) {
                if own_requirement.is_some() {
                    return Err(PropertyError::MultipleRequirementRules(name.to_string()));
                }
                own_requirement = Some(descriptor.requirement_from(key, &value)?);
                continue;
            }
            descriptor.apply_rule(key, &value, doc)?;
        }

        let mut override_requirement = None;
        if let Some(Value::Object(params)) = overrides {
            for (key, value) in params {
                if key.starts_with('_') {
                    continue;
                }
                if Requirement::is_requirement_key(key) {
                    if override_requirement.is_some() {
                        return Err(PropertyError::MultipleRequirementRules(name.to_string()));
                    }
                    override_requirement = Some(descriptor.requirement_from(key, value)?);
                    continue;
                }
                descriptor.apply_rule(key, value, doc)?;
            }
        }

        descriptor.requirement = override_requirement.or(own_requirement).unwrap_or(fallback);
        Ok(descriptor)
    }

    fn requirement_from(&mut self, key: &str, message: &Value) -> Result<Requirement, PropertyError> {
        let requirement = Requirement::parse(key).ok_or_else(|| PropertyError::InvalidRule {
            name: self.name.clone(),
            rule: key.to_string(),
            reason: "unknown requirement rule".to_string(),
        })?;
        if let Some(text) = message.as_str().filter(|m| !m.trim().is_empty()) {
            self.messages.insert("NEED".to_string(), text.to_string());
        }
        Ok(requirement)
    }

    fn apply_rule(&mut self, key: &str, value: &Value, doc: &DocMeta) -> Result<(), PropertyError> {
        let upper = key.trim().to_ascii_uppercase();
        let invalid = |reason: &str| PropertyError::InvalidRule {
            name: self.name.clone(),
            rule: upper.clone(),
            reason: reason.to_string(),
        };
        let rule = match upper.as_str() {
            "MIN" | "MAX" => {
                let bound = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                }
                .ok_or_else(|| invalid("expects a number"))?;
                if upper == "MIN" {
                    Rule::Min(bound)
                } else {
                    Rule::Max(bound)
                }
            }
            "IN" => match value {
                Value::String(s) => Rule::In(split_list(s, ',')),
                Value::Array(items) => Rule::In(
                    items
                        .iter()
                        .map(|i| i.as_str().map(str::to_string).unwrap_or_else(|| i.to_string()))
                        .collect(),
                ),
                _ => return Err(invalid("expects a list")),
            },
            "WRAPIN" => {
                let schema = value
                    .as_str()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| invalid("expects a wrap-in name"))?;
                let list = doc
                    .extra_param("WRAPIN", "LIST")
                    .map(|v| v.as_bool().unwrap_or(true))
                    .unwrap_or(false);
                Rule::WrapIn {
                    schema: schema.to_string(),
                    list,
                }
            }
            // Rules this engine does not know are left to custom validators.
            _ => return Ok(()),
        };
        self.rules.retain(|r| r.name() != rule.name());
        self.rules.push(rule);
        Ok(())
    }

    /// Request keys this property answers to, its own name first.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.compatibles.iter().map(String::as_str))
    }

    pub fn wrapin(&self) -> Option<(&str, bool)> {
        self.rules.iter().find_map(|r| match r {
            Rule::WrapIn { schema, list } => Some((schema.as_str(), *list)),
            _ => None,
        })
    }

    pub fn to_summary(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("title".into(), Value::String(self.title.clone()));
        out.insert("type".into(), serde_json::to_value(self.ty).unwrap_or(Value::Null));
        out.insert("location".into(), serde_json::to_value(self.location).unwrap_or(Value::Null));
        out.insert(
            "required".into(),
            Value::Bool(matches!(self.requirement, Requirement::Always)),
        );
        if let Some(default) = &self.default {
            out.insert("default".into(), default.clone());
        }
        if let Some(notes) = &self.notes {
            out.insert("notes".into(), Value::String(notes.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> DocMeta {
        DocMeta::new().with("TITLE", "Page size").with("TYPE", "uint")
    }

    #[test]
    fn test_cast_types() {
        assert_eq!(ArgType::Uint.cast(&json!("12")), Some(json!(12)));
        assert_eq!(ArgType::Pint.cast(&json!(0)), None);
        assert_eq!(ArgType::Bool.cast(&json!("yes")), Some(json!(true)));
        assert_eq!(ArgType::List.cast(&json!("a, b,")), Some(json!(["a", "b"])));
        assert_eq!(ArgType::Map.cast(&json!([1])), None);
    }

    #[test]
    fn test_requirement_parse() {
        assert_eq!(Requirement::parse("NEED"), Some(Requirement::Always));
        assert_eq!(Requirement::parse("need:0"), Some(Requirement::Never));
        assert_eq!(
            Requirement::parse("NEEDIFHAS:email"),
            Some(Requirement::IfHas("email".into()))
        );
        assert_eq!(Requirement::parse("NEEDIFNO"), None);
    }

    #[test]
    fn test_assemble_defaults_requirement() {
        let prop = PropertyDescriptor::assemble("size", &doc(), None, Requirement::Always).unwrap();
        assert_eq!(prop.requirement, Requirement::Always);
        assert_eq!(prop.ty, ArgType::Uint);
        assert_eq!(prop.location, Location::All);
    }

    #[test]
    fn test_assemble_overrides() {
        let overrides = json!({"NEED:0": "", "MAX": 50, "_comment": "ignored"});
        let prop =
            PropertyDescriptor::assemble("size", &doc(), Some(&overrides), Requirement::Always).unwrap();
        assert_eq!(prop.requirement, Requirement::Never);
        assert_eq!(prop.rules, vec![Rule::Max(50.0)]);
    }

    #[test]
    fn test_assemble_rejects_double_requirement() {
        let overrides = json!({"NEED": "", "NEEDIFNO:id": ""});
        let err = PropertyDescriptor::assemble("size", &doc(), Some(&overrides), Requirement::Always)
            .unwrap_err();
        assert_eq!(err, PropertyError::MultipleRequirementRules("size".into()));
    }

    #[test]
    fn test_assemble_missing_title_and_type() {
        let err = PropertyDescriptor::assemble("x", &DocMeta::new(), None, Requirement::Never)
            .unwrap_err();
        assert_eq!(err, PropertyError::TitleMissing("x".into()));

        let err = PropertyDescriptor::assemble(
            "x",
            &DocMeta::new().with("TITLE", "X").with("TYPE", "blob"),
            None,
            Requirement::Never,
        )
        .unwrap_err();
        assert!(matches!(err, PropertyError::UnsupportedType { .. }));
    }
}
