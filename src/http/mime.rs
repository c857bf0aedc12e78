//! MIME aliases and body encoding.
//!
//! Routes talk about content types through short aliases (`json`, `xml`, ...).
//! The alias table order is significant: resource-suffix matching walks it
//! front to back.

use serde_json::Value;

/// Alias → Content-Type, in suffix-matching order.
const ALIASES: [(&str, &str); 6] = [
    ("text", "text/plain"),
    ("html", "text/html"),
    ("view", "text/html"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("form", "application/x-www-form-urlencoded"),
];

pub const DEFAULT_ALIAS: &str = "json";

/// All known aliases, in suffix-matching order.
pub fn aliases() -> impl Iterator<Item = &'static str> {
    ALIASES.iter().map(|(alias, _)| *alias)
}

/// Content-Type for an alias.
pub fn mime(alias: &str) -> Option<&'static str> {
    ALIASES.iter().find(|(a, _)| *a == alias).map(|(_, m)| *m)
}

/// Alias for a Content-Type. Parameters such as `; charset=...` are ignored.
pub fn alias(content_type: &str) -> Option<&'static str> {
    let short = content_type.split(';').next().unwrap_or_default().trim();
    ALIASES
        .iter()
        .find(|(_, m)| m.eq_ignore_ascii_case(short))
        .map(|(a, _)| *a)
}

pub fn is_alias(candidate: &str) -> bool {
    mime(candidate).is_some()
}

/// Serialise a body for the given Content-Type.
pub fn encode(value: &Value, content_type: &str) -> String {
    match alias(content_type) {
        Some("xml") => {
            let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><xml>");
            write_xml(value, &mut out);
            out.push_str("</xml>");
            out
        }
        Some("text") | Some("html") | Some("view") => match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        },
        _ => value.to_string(),
    }
}

fn write_xml(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                let name = element_name(key);
                out.push('<');
                out.push_str(&name);
                out.push('>');
                write_xml(item, out);
                out.push_str("</");
                out.push_str(&name);
                out.push('>');
            }
        }
        Value::Array(items) => {
            for item in items {
                out.push_str("<item>");
                write_xml(item, out);
                out.push_str("</item>");
            }
        }
        Value::String(s) => escape_xml(s, out),
        Value::Null => {}
        other => out.push_str(&other.to_string()),
    }
}

/// Object keys as XML element names: characters outside a name become `_`,
/// and a name that cannot start with its first character gets a `_` prefix.
fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}

fn escape_xml(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
}
