//! Preflights: request-wide checks that run before routing.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::Value;

use crate::config::{CorsConfig, KernelConfig};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::verb::Verb;
use crate::pipeline::stage::Flow;
use crate::BoxError;

pub trait Preflight: Send + Sync {
    fn preflight(&self, request: &Request, response: &mut Response) -> Result<Flow<()>, BoxError>;
}

/// Adds CORS headers; answers OPTIONS requests with 204.
pub struct Cors {
    config: CorsConfig,
}

impl Cors {
    pub const NAME: &'static str = "cors";

    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }
}

impl Preflight for Cors {
    fn preflight(&self, request: &Request, response: &mut Response) -> Result<Flow<()>, BoxError> {
        let cors = &self.config;
        response
            .set_header("Access-Control-Allow-Origin", &cors.allow_origin.join(","))
            .set_header("Access-Control-Allow-Methods", &cors.allow_methods.join(","))
            .set_header("Access-Control-Allow-Headers", &cors.allow_headers.join(","))
            .set_header("Access-Control-Max-Age", &cors.max_age.to_string())
            .set_header(
                "Access-Control-Allow-Credentials",
                if cors.allow_credentials { "true" } else { "false" },
            );
        if !cors.expose_headers.is_empty() {
            response.set_header("Access-Control-Expose-Headers", &cors.expose_headers.join(","));
        }

        if request.verb() == Some(Verb::Options) {
            response
                .set_mime_alias("text")
                .set_body(Value::Null)
                .set_status(StatusCode::NO_CONTENT)
                .set_error(false);
            return Ok(Flow::Respond);
        }
        Ok(Flow::Next(()))
    }
}

/// Switches a single request into debug mode when it carries a known key.
pub struct DebugSwitch {
    header: String,
    keys: Vec<String>,
}

impl DebugSwitch {
    pub const NAME: &'static str = "debug";

    pub fn new(header: &str, keys: Vec<String>) -> Self {
        Self {
            header: header.to_string(),
            keys,
        }
    }
}

impl Preflight for DebugSwitch {
    fn preflight(&self, request: &Request, response: &mut Response) -> Result<Flow<()>, BoxError> {
        if let Some(key) = request.header(&self.header).filter(|k| !k.is_empty()) {
            if self.keys.iter().any(|k| k == key) {
                tracing::debug!(trace_id = %response.trace_id(), "Debug mode enabled for request");
                response.set_debug(true);
            }
        }
        Ok(Flow::Next(()))
    }
}

/// Preflights by name.
#[derive(Default, Clone)]
pub struct PreflightRegistry {
    preflights: BTreeMap<String, Arc<dyn Preflight>>,
}

impl PreflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `cors` and `debug`.
    pub fn builtin(config: &KernelConfig) -> Self {
        let mut registry = Self::new();
        registry
            .register(Cors::NAME, Arc::new(Cors::new(config.cors.clone())))
            .register(
                DebugSwitch::NAME,
                Arc::new(DebugSwitch::new(
                    &config.kernel.debug_header,
                    config.kernel.debug_keys.clone(),
                )),
            );
        registry
    }

    pub fn register(&mut self, name: &str, preflight: Arc<dyn Preflight>) -> &mut Self {
        self.preflights.insert(name.to_string(), preflight);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Preflight>> {
        self.preflights.get(name)
    }
}
