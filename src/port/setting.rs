//! Typed setting values and the rules for merging them.

use serde::Serialize;

/// A resolved setting value, as exposed by key-based lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Text(String),
    Int(i64),
    List(Vec<String>),
    Flag(bool),
}

impl SettingValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            SettingValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

/// How a raw annotation value is validated and normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Text,
    /// Text folded to lower case.
    Lower,
    /// A non-empty class name.
    Namespace,
    Int,
    /// An integer HTTP status in `100..=999`.
    Status,
    Flag,
    /// Comma separated list.
    List,
    /// Slash separated group path.
    Group,
    /// List of MIME aliases accepted as resource suffixes.
    Suffixes,
    PipesIn,
    PipesOut,
    Wrapper,
    WrapIn,
    /// A single MIME alias.
    Mime,
}

/// Where a setting's value may come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// Union of class, method, domain-local and domain-global lists.
    Union,
    /// Method value, else class value.
    Inherit,
    /// Method, else class, else domain-local, else domain-global.
    Cascade,
}

/// One row of the settings table.
#[derive(Debug, Clone, Copy)]
pub struct SettingSpec {
    pub key: &'static str,
    pub kind: SettingKind,
    pub merge: Merge,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingError {
    #[error("unknown port setting: {0}")]
    Unknown(String),

    #[error("port setting {key} expects {expected}")]
    Mismatch { key: String, expected: &'static str },
}

/// Conversion between a typed descriptor field and [`SettingValue`].
pub(crate) trait SettingField: Sized {
    fn to_setting(&self) -> Option<SettingValue>;
    fn from_setting(key: &str, value: Option<SettingValue>) -> Result<Self, SettingError>;
}

fn mismatch(key: &str, expected: &'static str) -> SettingError {
    SettingError::Mismatch {
        key: key.to_string(),
        expected,
    }
}

impl SettingField for Option<String> {
    fn to_setting(&self) -> Option<SettingValue> {
        self.clone().map(SettingValue::Text)
    }

    fn from_setting(key: &str, value: Option<SettingValue>) -> Result<Self, SettingError> {
        match value {
            None => Ok(None),
            Some(SettingValue::Text(s)) => Ok(Some(s)),
            Some(SettingValue::Int(i)) => Ok(Some(i.to_string())),
            Some(_) => Err(mismatch(key, "text")),
        }
    }
}

impl SettingField for Option<i64> {
    fn to_setting(&self) -> Option<SettingValue> {
        self.map(SettingValue::Int)
    }

    fn from_setting(key: &str, value: Option<SettingValue>) -> Result<Self, SettingError> {
        match value {
            None => Ok(None),
            Some(SettingValue::Int(i)) => Ok(Some(i)),
            Some(SettingValue::Text(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| mismatch(key, "integer")),
            Some(_) => Err(mismatch(key, "integer")),
        }
    }
}

impl SettingField for Option<u16> {
    fn to_setting(&self) -> Option<SettingValue> {
        self.map(|v| SettingValue::Int(i64::from(v)))
    }

    fn from_setting(key: &str, value: Option<SettingValue>) -> Result<Self, SettingError> {
        match <Option<i64>>::from_setting(key, value)? {
            None => Ok(None),
            Some(code @ 100..=999) => Ok(Some(code as u16)),
            Some(_) => Err(mismatch(key, "status code in 100..=999")),
        }
    }
}

impl SettingField for Vec<String> {
    fn to_setting(&self) -> Option<SettingValue> {
        Some(SettingValue::List(self.clone()))
    }

    fn from_setting(key: &str, value: Option<SettingValue>) -> Result<Self, SettingError> {
        match value {
            None => Ok(Vec::new()),
            Some(SettingValue::List(items)) => Ok(items),
            Some(SettingValue::Text(s)) => Ok(vec![s]),
            Some(_) => Err(mismatch(key, "list")),
        }
    }
}

impl SettingField for bool {
    fn to_setting(&self) -> Option<SettingValue> {
        Some(SettingValue::Flag(*self))
    }

    fn from_setting(key: &str, value: Option<SettingValue>) -> Result<Self, SettingError> {
        match value {
            None => Ok(false),
            Some(SettingValue::Flag(b)) => Ok(b),
            Some(_) => Err(mismatch(key, "flag")),
        }
    }
}
