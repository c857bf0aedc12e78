//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (wrapper names, MIME aliases)
//! - Validate value ranges (segment cap, page sizes, STATUSOK)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: KernelConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use serde_json::Value;

use crate::config::schema::{DomainConfig, KernelConfig};
use crate::http::mime;
use crate::http::wrapper::WrapperRegistry;

/// Upper bound for `kernel.max_param_segments`.
pub const MAX_PARAM_SEGMENTS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("kernel.max_param_segments must be between 1 and {MAX_PARAM_SEGMENTS}")]
    ParamSegments,

    #[error("kernel.preflight lists {0} more than once")]
    DuplicatePreflight(String),

    #[error("wrappers.{0} defines neither out nor err fields")]
    EmptyWrapper(String),

    #[error("kernel.debug_header must not be empty")]
    DebugHeader,

    #[error("paginate.default_size must be between 1 and paginate.max_size")]
    PageSize,

    #[error("{scope}: unknown wrapper {name}")]
    UnknownWrapper { scope: String, name: String },

    #[error("{scope}: unknown MIME alias {alias}")]
    UnknownMime { scope: String, alias: String },

    #[error("{scope}: STATUSOK must be an integer in 100..=999")]
    StatusOk { scope: String },
}

/// Check a parsed configuration.
pub fn validate_config(config: &KernelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if !(1..=MAX_PARAM_SEGMENTS).contains(&config.kernel.max_param_segments) {
        errors.push(ValidationError::ParamSegments);
    }
    let mut seen = std::collections::BTreeSet::new();
    for name in &config.kernel.preflight {
        if !seen.insert(name.as_str()) {
            errors.push(ValidationError::DuplicatePreflight(name.clone()));
        }
    }
    if config.kernel.debug_header.trim().is_empty() {
        errors.push(ValidationError::DebugHeader);
    }
    if config.paginate.default_size == 0 || config.paginate.default_size > config.paginate.max_size {
        errors.push(ValidationError::PageSize);
    }

    for (name, wrapper) in &config.wrappers {
        if wrapper.out.is_empty() && wrapper.err.is_empty() {
            errors.push(ValidationError::EmptyWrapper(name.clone()));
        }
    }

    let wrappers = WrapperRegistry::with_config(&config.wrappers);
    check_domain("domain", &config.domain, &wrappers, &mut errors);
    for (name, domain) in &config.domains {
        check_domain(&format!("domains.{name}"), domain, &wrappers, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_domain(
    scope: &str,
    domain: &DomainConfig,
    wrappers: &WrapperRegistry,
    errors: &mut Vec<ValidationError>,
) {
    for key in ["WRAPOUT", "WRAPERR"] {
        if let Some(Value::String(name)) = domain.port_setting(key) {
            if name != "_" && !wrappers.contains(name) {
                errors.push(ValidationError::UnknownWrapper {
                    scope: scope.to_string(),
                    name: name.clone(),
                });
            }
        }
    }
    for key in ["MIMEOUT", "MIMEIN"] {
        if let Some(Value::String(alias)) = domain.port_setting(key) {
            if alias != "_" && !mime::is_alias(&alias.to_ascii_lowercase()) {
                errors.push(ValidationError::UnknownMime {
                    scope: scope.to_string(),
                    alias: alias.clone(),
                });
            }
        }
    }
    if let Some(status) = domain.port_setting("STATUSOK") {
        if !status.as_i64().is_some_and(|s| (100..=999).contains(&s)) {
            errors.push(ValidationError::StatusOk {
                scope: scope.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&KernelConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let config: KernelConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "nowhere"

            [kernel]
            max_param_segments = 0

            [domain.port]
            WRAPOUT = "missing"
            MIMEOUT = "yaml"
            STATUSOK = 42
            "#,
        )
        .unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::ParamSegments));
    }

    #[test]
    fn test_preflight_and_wrapper_checks() {
        let config: KernelConfig = toml::from_str(
            r#"
            [kernel]
            preflight = ["cors", "debug", "cors"]

            [wrappers.blank]
            "#,
        )
        .unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::DuplicatePreflight("cors".to_string()),
                ValidationError::EmptyWrapper("blank".to_string()),
            ]
        );
    }
}
