//! Setting normalisers and the merge across the four setting levels.
//!
//! Every key of [`PortSettings::SPECS`] is resolved here: raw annotation or
//! configuration values are checked against the key's [`SettingKind`] and
//! merged according to its [`Merge`] rule.

use serde_json::Value;

use crate::assembler::error::{AssemblyError, Level};
use crate::config::KernelConfig;
use crate::http::mime;
use crate::http::wrapper::WrapperRegistry;
use crate::metadata::DocMeta;
use crate::pipeline::PipeRegistry;
use crate::port::{Merge, PortSettings, SettingError, SettingKind, SettingSpec, SettingValue};
use crate::validate::rules::split_list;
use crate::validate::WrapInRegistry;

/// Method-level value that clears an inherited setting.
pub const CLEAR: &str = "_";

/// Registries that referential settings are checked against.
pub(crate) struct Lookups<'a> {
    pub pipes: &'a PipeRegistry,
    pub wrappers: &'a WrapperRegistry,
    pub wrapins: &'a WrapInRegistry,
}

/// Why a raw value was refused.
#[derive(Debug, PartialEq)]
enum Rejection {
    Type(&'static str),
    Pipe(String),
    Wrapper(String),
    WrapIn(String),
    Mime(String),
}

/// The four levels a port's settings are drawn from.
pub(crate) struct Scope<'a> {
    pub class: &'a str,
    pub method: &'a str,
    pub domain: &'a str,
    pub class_doc: &'a DocMeta,
    pub method_doc: &'a DocMeta,
    pub config: &'a KernelConfig,
}

impl<'a> Scope<'a> {
    /// Merge every setting of the table into a typed [`PortSettings`].
    pub(crate) fn resolve(&self, lookups: &Lookups<'_>) -> Result<PortSettings, AssemblyError> {
        let mut settings = PortSettings::default();
        for spec in PortSettings::SPECS {
            let resolved = match spec.merge {
                Merge::Union => self.union(spec, lookups)?,
                Merge::Inherit => self.pick(spec, 2, lookups)?,
                Merge::Cascade => self.pick(spec, 4, lookups)?,
            };
            let (level, value) = match resolved {
                Some((level, value)) => (level, Some(value)),
                None => (Level::Method, None),
            };
            let echo = value.as_ref().map(setting_json).unwrap_or(Value::Null);
            settings.set(spec.key, value).map_err(|e| match e {
                SettingError::Mismatch { expected, .. } => self.invalid(spec.key, level, expected, echo),
                SettingError::Unknown(_) => self.invalid(spec.key, level, "setting", echo),
            })?;
        }
        Ok(settings)
    }

    fn levels(&self, key: &str) -> [(Level, Option<&'a Value>); 4] {
        let (local, global) = self.config.domain_setting(self.domain, key);
        [
            (Level::Method, self.method_doc.value(key)),
            (Level::Class, self.class_doc.value(key)),
            (Level::DomainLocal, local),
            (Level::DomainGlobal, global),
        ]
    }

    /// First value among the first `depth` levels, unless the method clears it.
    fn pick(
        &self,
        spec: &SettingSpec,
        depth: usize,
        lookups: &Lookups<'_>,
    ) -> Result<Option<(Level, SettingValue)>, AssemblyError> {
        if self.method_doc.text(spec.key).map(str::trim) == Some(CLEAR) {
            return Ok(None);
        }
        for (level, raw) in self.levels(spec.key).into_iter().take(depth) {
            if let Some(raw) = raw {
                let value = normalize(spec.kind, raw, lookups)
                    .map_err(|r| self.reject(spec.key, level, raw, r))?;
                return Ok(Some((level, value)));
            }
        }
        Ok(None)
    }

    /// Class, method, domain-local, domain-global lists joined without duplicates.
    fn union(
        &self,
        spec: &SettingSpec,
        lookups: &Lookups<'_>,
    ) -> Result<Option<(Level, SettingValue)>, AssemblyError> {
        let [method, class, local, global] = self.levels(spec.key);
        let mut merged: Vec<String> = Vec::new();
        for (level, raw) in [class, method, local, global] {
            let Some(raw) = raw else {
                continue;
            };
            match normalize(spec.kind, raw, lookups).map_err(|r| self.reject(spec.key, level, raw, r))? {
                SettingValue::List(items) => {
                    for item in items {
                        if !merged.contains(&item) {
                            merged.push(item);
                        }
                    }
                }
                _ => return Err(self.invalid(spec.key, level, "list", raw.clone())),
            }
        }
        Ok(Some((Level::Method, SettingValue::List(merged))))
    }

    fn invalid(&self, key: &str, level: Level, expected: &'static str, value: Value) -> AssemblyError {
        AssemblyError::InvalidAnnotationType {
            class: self.class.to_string(),
            method: self.method.to_string(),
            annotation: key.to_string(),
            level,
            expected,
            value,
        }
    }

    fn reject(&self, key: &str, level: Level, raw: &Value, rejection: Rejection) -> AssemblyError {
        let class = self.class.to_string();
        let method = self.method.to_string();
        match rejection {
            Rejection::Type(expected) => self.invalid(key, level, expected, raw.clone()),
            Rejection::Pipe(pipe) => AssemblyError::PipeNotExists {
                class,
                method,
                annotation: key.to_string(),
                pipe,
            },
            Rejection::Wrapper(wrapper) => AssemblyError::WrapperNotExists {
                class,
                method,
                annotation: key.to_string(),
                wrapper,
            },
            Rejection::WrapIn(wrapin) => AssemblyError::WrapInNotExists { class, method, wrapin },
            Rejection::Mime(alias) => AssemblyError::InvalidMimeAlias {
                class,
                method,
                annotation: key.to_string(),
                alias,
            },
        }
    }
}

fn setting_json(value: &SettingValue) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn list(raw: &Value, sep: char) -> Option<Vec<String>> {
    match raw {
        Value::String(s) => Some(split_list(s, sep)),
        Value::Array(items) => items
            .iter()
            .map(text)
            .filter(|item| item.as_deref() != Some(""))
            .collect(),
        _ => None,
    }
}

fn int(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_i64() != Some(0)),
        Value::String(s) => Some(!matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "" | "0" | "false" | "no" | "off"
        )),
        _ => None,
    }
}

/// Check one raw value against its kind and bring it into canonical form.
fn normalize(kind: SettingKind, raw: &Value, lookups: &Lookups<'_>) -> Result<SettingValue, Rejection> {
    match kind {
        SettingKind::Text => text(raw).map(SettingValue::Text).ok_or(Rejection::Type("string")),
        SettingKind::Lower => text(raw)
            .map(|s| SettingValue::Text(s.to_ascii_lowercase()))
            .ok_or(Rejection::Type("string")),
        SettingKind::Namespace => text(raw)
            .filter(|s| !s.is_empty())
            .map(SettingValue::Text)
            .ok_or(Rejection::Type("namespace")),
        SettingKind::Int => int(raw).map(SettingValue::Int).ok_or(Rejection::Type("integer")),
        SettingKind::Status => int(raw)
            .filter(|code| (100..=999).contains(code))
            .map(SettingValue::Int)
            .ok_or(Rejection::Type("status code")),
        SettingKind::Flag => flag(raw).map(SettingValue::Flag).ok_or(Rejection::Type("flag")),
        SettingKind::List => list(raw, ',').map(SettingValue::List).ok_or(Rejection::Type("list")),
        SettingKind::Group => list(raw, '/').map(SettingValue::List).ok_or(Rejection::Type("group path")),
        SettingKind::Suffixes => {
            let aliases: Vec<String> = list(raw, ',')
                .ok_or(Rejection::Type("list"))?
                .into_iter()
                .map(|a| a.to_ascii_lowercase())
                .collect();
            match aliases.iter().find(|a| !mime::is_alias(a)) {
                Some(unknown) => Err(Rejection::Mime(unknown.clone())),
                None => Ok(SettingValue::List(aliases)),
            }
        }
        SettingKind::PipesIn | SettingKind::PipesOut => {
            let pipes = list(raw, ',').ok_or(Rejection::Type("list"))?;
            let exists = |name: &str| match kind {
                SettingKind::PipesIn => lookups.pipes.has_in(name),
                _ => lookups.pipes.has_out(name),
            };
            match pipes.iter().find(|p| !exists(p)) {
                Some(unknown) => Err(Rejection::Pipe(unknown.clone())),
                None => Ok(SettingValue::List(pipes)),
            }
        }
        SettingKind::Wrapper => {
            let name = text(raw).ok_or(Rejection::Type("string"))?;
            if lookups.wrappers.contains(&name) {
                Ok(SettingValue::Text(name))
            } else {
                Err(Rejection::Wrapper(name))
            }
        }
        SettingKind::WrapIn => {
            let name = text(raw).ok_or(Rejection::Type("string"))?;
            if lookups.wrapins.contains(&name) {
                Ok(SettingValue::Text(name))
            } else {
                Err(Rejection::WrapIn(name))
            }
        }
        SettingKind::Mime => {
            let alias = text(raw).ok_or(Rejection::Type("string"))?.to_ascii_lowercase();
            if mime::is_alias(&alias) {
                Ok(SettingValue::Text(alias))
            } else {
                Err(Rejection::Mime(alias))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainConfig;
    use serde_json::json;

    struct Fixture {
        config: KernelConfig,
        pipes: PipeRegistry,
        wrappers: WrapperRegistry,
        wrapins: WrapInRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let mut config = KernelConfig::default();
            config.domain.port.insert("PIPEIN".into(), json!(["paginate"]));
            config.domain.port.insert("WRAPOUT".into(), json!("classic"));
            config.domain.port.insert("CODEOK".into(), json!(1));
            let mut local = DomainConfig::default();
            local.port.insert("PIPEIN".into(), json!("sorting"));
            local.port.insert("CODEOK".into(), json!(2));
            config.domains.insert("shop".into(), local);
            Self {
                pipes: PipeRegistry::builtin(&config),
                wrappers: WrapperRegistry::builtin(),
                wrapins: WrapInRegistry::new(),
                config,
            }
        }

        fn resolve(&self, class_doc: DocMeta, method_doc: DocMeta) -> Result<PortSettings, AssemblyError> {
            let scope = Scope {
                class: "Shop\\Port\\Order",
                method: "list",
                domain: "shop",
                class_doc: &class_doc,
                method_doc: &method_doc,
                config: &self.config,
            };
            scope.resolve(&Lookups {
                pipes: &self.pipes,
                wrappers: &self.wrappers,
                wrapins: &self.wrapins,
            })
        }
    }

    #[test]
    fn test_precedence_method_class_local_global() {
        let fixture = Fixture::new();
        let settings = fixture
            .resolve(DocMeta::new().with("CODEOK", 3), DocMeta::new().with("CODEOK", 4))
            .unwrap();
        assert_eq!(settings.codeok, Some(4));

        let settings = fixture.resolve(DocMeta::new().with("CODEOK", 3), DocMeta::new()).unwrap();
        assert_eq!(settings.codeok, Some(3));

        let settings = fixture.resolve(DocMeta::new(), DocMeta::new()).unwrap();
        assert_eq!(settings.codeok, Some(2));
        assert_eq!(settings.wrapout.as_deref(), Some("classic"));
    }

    #[test]
    fn test_inherit_ignores_domain_levels() {
        let mut fixture = Fixture::new();
        fixture.config.domain.port.insert("VERSION".into(), json!("v9"));
        let settings = fixture.resolve(DocMeta::new(), DocMeta::new()).unwrap();
        assert_eq!(settings.version, None);

        let settings = fixture
            .resolve(DocMeta::new().with("VERSION", "V2"), DocMeta::new())
            .unwrap();
        assert_eq!(settings.version.as_deref(), Some("v2"));
    }

    #[test]
    fn test_union_merges_every_level() {
        let fixture = Fixture::new();
        let settings = fixture
            .resolve(
                DocMeta::new().with("PIPEIN", "rest_wrapout"),
                DocMeta::new().with("PIPEIN", json!(["sorting", "rest_wrapout"])),
            )
            .unwrap();
        assert_eq!(settings.pipein, ["rest_wrapout", "sorting", "paginate"]);
    }

    #[test]
    fn test_method_clear_skips_inheritance() {
        let fixture = Fixture::new();
        let settings = fixture
            .resolve(DocMeta::new().with("CODEOK", 3), DocMeta::new().with("CODEOK", "_"))
            .unwrap();
        assert_eq!(settings.codeok, None);
    }

    #[test]
    fn test_type_mismatch_reports_level() {
        let fixture = Fixture::new();
        let err = fixture
            .resolve(DocMeta::new().with("AUTH", json!({"x": 1})), DocMeta::new())
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ANNOTATION_TYPE");
        assert!(matches!(err, AssemblyError::InvalidAnnotationType { level: Level::Class, .. }));

        let err = fixture
            .resolve(DocMeta::new(), DocMeta::new().with("STATUSOK", 42))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ANNOTATION_TYPE");
    }

    #[test]
    fn test_referential_checks() {
        let fixture = Fixture::new();
        let cases = [
            (DocMeta::new().with("PIPEIN", "nope"), "PIPE_NOT_EXISTS"),
            (DocMeta::new().with("PIPEOUT", "paginate"), "PIPE_NOT_EXISTS"),
            (DocMeta::new().with("WRAPERR", "fancy"), "WRAPPER_NOT_EXISTS"),
            (DocMeta::new().with("WRAPIN", "Shop\\Form"), "WRAPIN_NOT_EXISTS"),
            (DocMeta::new().with("MIMEIN", "yaml"), "INVALID_MIME_ALIAS"),
            (DocMeta::new().with("SUFFIX", "json,png"), "INVALID_MIME_ALIAS"),
        ];
        for (method_doc, code) in cases {
            let err = fixture.resolve(DocMeta::new(), method_doc).unwrap_err();
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_list_kinds() {
        let fixture = Fixture::new();
        let settings = fixture
            .resolve(
                DocMeta::new().with("GROUP", "orders/admin").with("NODOC", "yes"),
                DocMeta::new().with("SUFFIX", "JSON, xml").with("NODUMP", 0),
            )
            .unwrap();
        assert_eq!(settings.group, ["orders", "admin"]);
        assert_eq!(settings.suffix, ["json", "xml"]);
        assert!(settings.nodoc);
        assert!(!settings.nodump);
    }
}
