//! Terminate hooks: run after the result is packed, before it is sent.

use serde_json::Value;

use crate::http::request::Request;
use crate::http::response::Response;
use crate::pipeline::context::RouteContext;
use crate::port::PortView;
use crate::BoxError;

/// Failures are logged and never change the response.
pub trait TerminateHook: Send + Sync {
    fn terminate(
        &self,
        request: &Request,
        response: &Response,
        route: &RouteContext,
        port: &PortView,
    ) -> Result<(), BoxError>;
}

/// Arguments always masked in audit records.
const ALWAYS_MASKED: [&str; 2] = ["password", "secret"];

/// Writes an audit record for ports that declare a LOGGING channel.
pub struct AuditLog;

impl AuditLog {
    fn masked_arguments(route: &RouteContext, port: &PortView) -> Value {
        let mut arguments = route.arguments().clone();
        let masks = ALWAYS_MASKED
            .iter()
            .copied()
            .chain(port.settings.logmaskkey.iter().map(String::as_str));
        for key in masks {
            if let Some(value) = arguments.get_mut(key) {
                *value = Value::String("*".to_string());
            }
        }
        Value::Object(arguments)
    }
}

impl TerminateHook for AuditLog {
    fn terminate(
        &self,
        request: &Request,
        response: &Response,
        route: &RouteContext,
        port: &PortView,
    ) -> Result<(), BoxError> {
        let Some(channel) = port.settings.logging.as_deref() else {
            return Ok(());
        };
        let entry = route.entry();
        let params = serde_json::to_string(&entry.params)?;
        let arguments = serde_json::to_string(&Self::masked_arguments(route, port))?;
        tracing::info!(
            target: "portkernel::audit",
            channel,
            at = %request.received_at().to_rfc3339(),
            title = %port.title,
            verb = %entry.verb,
            path = %entry.url_path,
            port = %entry.target(),
            params = %params,
            arguments = %arguments,
            client_ip = request.client_ip().unwrap_or("-"),
            status = response.status().as_u16(),
            error = response.is_error(),
            trace_id = %response.trace_id(),
            "Port audit"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::verb::Verb;
    use crate::port::{PortDescriptor, PortSettings};
    use crate::routing::{RouteEntry, RouteParams};
    use serde_json::{json, Map};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn test_masks_sensitive_arguments() {
        let descriptor = PortDescriptor {
            class: "Auth".into(),
            method: "login".into(),
            domain: String::new(),
            title: "Login".into(),
            notes: None,
            route: "login".into(),
            verbs: vec![Verb::Post],
            settings: PortSettings {
                logging: Some("auth".into()),
                logmaskkey: vec!["otp".into()],
                ..PortSettings::default()
            },
            arguments: Vec::new(),
            parameters: Vec::new(),
            extra: BTreeMap::new(),
        };
        let entry = RouteEntry {
            class: "Auth".into(),
            method: "login".into(),
            verb: Verb::Post,
            definition: "login".into(),
            url_path: "login".into(),
            suffix: None,
            params: RouteParams::default(),
        };
        let mut route = RouteContext::new(entry, None);
        let mut args = Map::new();
        args.insert("user".into(), json!("ana"));
        args.insert("password".into(), json!("hunter2"));
        args.insert("otp".into(), json!("123456"));
        route.set_arguments(args);
        let port = PortView::new(Arc::new(descriptor));

        let masked = AuditLog::masked_arguments(&route, &port);
        assert_eq!(masked, json!({"user": "ana", "password": "*", "otp": "*"}));

        let result = AuditLog.terminate(&Request::post("/login"), &Response::new(), &route, &port);
        assert!(result.is_ok());
    }
}
