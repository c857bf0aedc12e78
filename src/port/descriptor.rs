//! The resolved, immutable configuration of one routable handler method.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::http::verb::Verb;
use crate::metadata::ParamMeta;
use crate::port::setting::{Merge, SettingError, SettingField, SettingKind, SettingSpec, SettingValue};
use crate::validate::PropertyDescriptor;

/// Declares the typed settings struct together with its key table.
macro_rules! port_settings {
    ($($field:ident: $ty:ty = $key:literal, $kind:ident, $merge:ident;)+) => {
        /// Merged settings of one port, one field per annotation key.
        #[derive(Debug, Clone, Default, PartialEq, Serialize)]
        pub struct PortSettings {
            $(pub $field: $ty,)+
        }

        impl PortSettings {
            /// Every setting with its normaliser kind and merge rule.
            pub const SPECS: &'static [SettingSpec] = &[
                $(SettingSpec { key: $key, kind: SettingKind::$kind, merge: Merge::$merge },)+
            ];

            /// Value by upper-cased annotation key.
            pub fn get(&self, key: &str) -> Option<SettingValue> {
                match key.trim().to_ascii_uppercase().as_str() {
                    $($key => self.$field.to_setting(),)+
                    _ => None,
                }
            }

            /// Replace a value by key; `None` clears it.
            pub fn set(&mut self, key: &str, value: Option<SettingValue>) -> Result<(), SettingError> {
                match key.trim().to_ascii_uppercase().as_str() {
                    $($key => {
                        self.$field = <$ty as SettingField>::from_setting($key, value)?;
                        Ok(())
                    })+
                    other => Err(SettingError::Unknown(other.to_string())),
                }
            }
        }
    };
}

port_settings! {
    version: Option<String> = "VERSION", Lower, Inherit;
    group: Vec<String> = "GROUP", Group, Inherit;
    suffix: Vec<String> = "SUFFIX", Suffixes, Inherit;
    auth: Option<i64> = "AUTH", Int, Inherit;
    status: Option<String> = "STATUS", Text, Inherit;
    author: Option<String> = "AUTHOR", Text, Inherit;
    model: Option<String> = "MODEL", Namespace, Inherit;
    assembler: Option<String> = "ASSEMBLER", Namespace, Inherit;
    nodump: bool = "NODUMP", Flag, Inherit;
    nodoc: bool = "NODOC", Flag, Inherit;
    wrapin: Option<String> = "WRAPIN", WrapIn, Inherit;
    nopipein: Vec<String> = "NOPIPEIN", PipesIn, Inherit;
    nopipeout: Vec<String> = "NOPIPEOUT", PipesOut, Inherit;
    logging: Option<String> = "LOGGING", Text, Inherit;
    logmaskkey: Vec<String> = "LOGMASKKEY", List, Inherit;
    pipein: Vec<String> = "PIPEIN", PipesIn, Union;
    pipeout: Vec<String> = "PIPEOUT", PipesOut, Union;
    codeok: Option<i64> = "CODEOK", Int, Cascade;
    statusok: Option<u16> = "STATUSOK", Status, Cascade;
    infook: Option<String> = "INFOOK", Text, Cascade;
    wrapout: Option<String> = "WRAPOUT", Wrapper, Cascade;
    wraperr: Option<String> = "WRAPERR", Wrapper, Cascade;
    mimeout: Option<String> = "MIMEOUT", Mime, Cascade;
    mimein: Option<String> = "MIMEIN", Mime, Cascade;
}

/// Everything the kernel needs to know about one handler method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortDescriptor {
    pub class: String,
    pub method: String,
    pub domain: String,
    pub title: String,
    pub notes: Option<String>,
    /// Route definition, e.g. `v1/users/{id}`.
    pub route: String,
    pub verbs: Vec<Verb>,
    pub settings: PortSettings,
    /// Declared arguments in order.
    pub arguments: Vec<PropertyDescriptor>,
    /// Positional handler parameters.
    pub parameters: Vec<ParamMeta>,
    /// Annotation parameters, method over class, keyed by annotation.
    pub extra: BTreeMap<String, Value>,
}

impl PortDescriptor {
    /// `Class@method`.
    pub fn target(&self) -> String {
        format!("{}@{}", self.class, self.method)
    }

    /// Upper-cased key lookup over the descriptor's annotations.
    pub fn annotation(&self, key: &str) -> Option<SettingValue> {
        match key.trim().to_ascii_uppercase().as_str() {
            "TITLE" => Some(SettingValue::Text(self.title.clone())),
            "NOTES" => self.notes.clone().map(SettingValue::Text),
            "ROUTE" => Some(SettingValue::Text(self.route.clone())),
            "VERB" => Some(SettingValue::List(
                self.verbs.iter().map(|v| v.as_str().to_string()).collect(),
            )),
            "ARGUMENT" => Some(SettingValue::List(
                self.arguments.iter().map(|a| a.name.clone()).collect(),
            )),
            other => self.settings.get(other),
        }
    }

    pub fn annotation_or(&self, key: &str, default: SettingValue) -> SettingValue {
        self.annotation(key).unwrap_or(default)
    }

    /// One annotation parameter, e.g. `extra_param("PIPEIN", "sorting")`.
    pub fn extra_param(&self, annotation: &str, param: &str) -> Option<&Value> {
        self.extra
            .get(&annotation.to_ascii_uppercase())?
            .as_object()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(param))
            .map(|(_, v)| v)
    }

    /// Whether a resource suffix (MIME alias) may be appended to this route.
    pub fn accepts_suffix(&self, alias: &str) -> bool {
        self.settings.suffix.iter().any(|s| s == alias)
    }
}
