//! Route expressions and verbs of a handler method.

use serde_json::Value;

use crate::assembler::error::AssemblyError;
use crate::http::verb::Verb;
use crate::metadata::DocMeta;
use crate::routing::PathTemplate;
use crate::validate::rules::split_list;

/// Where a method is reachable.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RouteSpec {
    pub template: PathTemplate,
    pub verbs: Vec<Verb>,
}

/// `[version, class ROUTE, method ROUTE]` joined by `/`, empty parts skipped.
///
/// `None` when neither the class nor the method declares a route; such a
/// method is a plain callable. `ROUTE(EXTENDS=false)` on the method drops
/// the class fragment.
pub(crate) fn expression(class_doc: &DocMeta, method_doc: &DocMeta) -> Option<String> {
    let class_route = fragment(class_doc.text("ROUTE"));
    let method_route = fragment(method_doc.text("ROUTE"));
    if class_route.is_none() && method_route.is_none() {
        return None;
    }

    let extends = method_doc
        .extra_param("ROUTE", "EXTENDS")
        .map(extends_flag)
        .unwrap_or(true);
    let class_route = class_route.filter(|_| extends);
    let version = fragment(method_doc.text("VERSION").or_else(|| class_doc.text("VERSION")))
        .map(|v| v.to_ascii_lowercase());

    let parts: Vec<String> = [version, class_route, method_route].into_iter().flatten().collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn fragment(raw: Option<&str>) -> Option<String> {
    raw.map(|r| r.trim().trim_matches('/'))
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

fn extends_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() != Some(0),
        Value::String(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no" | "off"),
        _ => true,
    }
}

/// Route of a method, or `None` when the method is not routed.
pub(crate) fn resolve(
    class: &str,
    method: &str,
    class_doc: &DocMeta,
    method_doc: &DocMeta,
) -> Result<Option<RouteSpec>, AssemblyError> {
    let Some(expression) = expression(class_doc, method_doc) else {
        return Ok(None);
    };

    let raw = method_doc.value("VERB").or_else(|| class_doc.value("VERB"));
    let names = match raw {
        Some(Value::String(s)) => split_list(s, ','),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect(),
        Some(other) => vec![other.to_string()],
        None => Vec::new(),
    };
    if names.is_empty() {
        return Err(AssemblyError::RouteWithoutVerb {
            class: class.to_string(),
            method: method.to_string(),
        });
    }

    let mut verbs = Vec::with_capacity(names.len());
    for name in names {
        let verb = name.parse::<Verb>().map_err(|_| AssemblyError::InvalidHttpVerb {
            class: class.to_string(),
            method: method.to_string(),
            verb: name.clone(),
        })?;
        if !verbs.contains(&verb) {
            verbs.push(verb);
        }
    }

    Ok(Some(RouteSpec {
        template: PathTemplate::parse(&expression),
        verbs,
    }))
}
