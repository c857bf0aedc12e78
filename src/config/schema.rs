//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the kernel.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::wrapper::Wrapper;

/// Root configuration for the dispatch kernel.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct KernelConfig {
    /// Listener configuration for the HTTP adapter.
    pub listener: ListenerConfig,

    /// Pipeline behaviour.
    pub kernel: KernelSettings,

    /// Global domain: fallback port settings for every domain.
    pub domain: DomainConfig,

    /// Domain-local port settings, by domain name.
    pub domains: BTreeMap<String, DomainConfig>,

    /// The `cors` preflight.
    pub cors: CorsConfig,

    /// The `paginate` pipe.
    pub paginate: PaginateConfig,

    /// Wrappers in addition to the built-in ones.
    pub wrappers: BTreeMap<String, Wrapper>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl KernelConfig {
    /// Domain-local then global value of a port setting.
    pub fn domain_setting(&self, domain: &str, key: &str) -> (Option<&Value>, Option<&Value>) {
        let local = self.domains.get(domain).and_then(|d| d.port_setting(key));
        (local, self.domain.port_setting(key))
    }

    pub fn domain_title(&self, domain: &str) -> Option<&str> {
        self.domains.get(domain).and_then(|d| d.title.as_deref())
    }

    pub fn group_title(&self, domain: &str, group: &str) -> Option<&str> {
        self.domains
            .get(domain)
            .and_then(|d| d.groups.get(group))
            .or_else(|| self.domain.groups.get(group))
            .map(String::as_str)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest request body read by the adapter, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Pipeline behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KernelSettings {
    /// Preflights run before routing, in order.
    pub preflight: Vec<String>,

    /// Include failure detail in every error body.
    pub debug: bool,

    /// Header the `debug` preflight reads.
    pub debug_header: String,

    /// Values of `debug_header` that switch debug mode on for one request.
    pub debug_keys: Vec<String>,

    /// Halt marker file; while present, routed requests get 503.
    pub halt_file: PathBuf,

    /// Longest path (in segments) tried against parameterised routes.
    pub max_param_segments: usize,

    /// Handler metadata manifest used by offline tooling.
    pub manifest: Option<PathBuf>,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            preflight: Vec::new(),
            debug: false,
            debug_header: "X-Debug-Key".to_string(),
            debug_keys: Vec::new(),
            halt_file: PathBuf::from("var/http.halt"),
            max_param_segments: 12,
            manifest: None,
        }
    }
}

/// Port settings and documentation titles of one domain.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DomainConfig {
    pub title: Option<String>,

    /// Port setting defaults by annotation key (`WRAPOUT`, `PIPEIN`, ...).
    pub port: BTreeMap<String, Value>,

    /// Group titles for documentation, by group path.
    pub groups: BTreeMap<String, String>,
}

impl DomainConfig {
    /// Case-insensitive lookup of a port setting default.
    pub fn port_setting(&self, key: &str) -> Option<&Value> {
        self.port
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }
}

/// Cross-origin resource sharing headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    /// Preflight cache lifetime in seconds.
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: vec!["*".to_string()],
            allow_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "PUT".to_string(),
                "PATCH".to_string(),
                "DELETE".to_string(),
                "OPTIONS".to_string(),
            ],
            allow_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            expose_headers: Vec::new(),
            allow_credentials: true,
            max_age: 604_800,
        }
    }
}

/// Pagination defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaginateConfig {
    pub default_size: u64,
    pub max_size: u64,
}

impl Default for PaginateConfig {
    fn default() -> Self {
        Self {
            default_size: 10,
            max_size: 50,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit JSON log lines.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: KernelConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.kernel.max_param_segments, 12);
        assert_eq!(config.paginate.max_size, 50);
    }

    #[test]
    fn test_domain_settings_cascade() {
        let config: KernelConfig = toml::from_str(
            r#"
            [domain.port]
            WRAPOUT = "classic"
            PIPEIN = ["paginate"]

            [domain.groups]
            users = "User management"

            [domains.shop]
            title = "Shop"
            [domains.shop.port]
            wrapout = "http"
            "#,
        )
        .unwrap();
        let (local, global) = config.domain_setting("shop", "WRAPOUT");
        assert_eq!(local, Some(&json!("http")));
        assert_eq!(global, Some(&json!("classic")));
        assert_eq!(config.domain_setting("other", "PIPEIN").1, Some(&json!(["paginate"])));
        assert_eq!(config.domain_title("shop"), Some("Shop"));
        assert_eq!(config.group_title("shop", "users"), Some("User management"));
    }

    #[test]
    fn test_wrappers_from_config() {
        let config: KernelConfig = toml::from_str(
            r#"
            [[wrappers.mobile.out]]
            key = "payload"
            slot = "data"

            [[wrappers.mobile.out]]
            key = "api"
            default = "m1"
            "#,
        )
        .unwrap();
        let mobile = &config.wrappers["mobile"];
        assert_eq!(mobile.out.len(), 2);
        assert!(mobile.err.is_empty());
    }
}
