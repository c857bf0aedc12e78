//! Transport-neutral response model.
//!
//! # Responsibilities
//! - Hold status, content type, headers and body until SEND
//! - Record the failure class of an error response (abort, fail, exception)
//! - Carry wrap-out / wrap-err context filled in by pipes
//! - Transmit exactly once through a [`Transport`]

use std::collections::BTreeMap;
use std::fmt;

use axum::http::StatusCode;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::http::mime;
use crate::BoxError;

/// How an error response came about; selects the log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Expected client-facing condition (404, 503). Not logged above debug.
    Abort,
    /// Rejected input or state (400 and friends). Logged at warn.
    Fail,
    /// Stage failure. Logged at error, always 500.
    Exception,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub class: FailureClass,
    pub name: String,
    pub context: Value,
    pub cause: Option<String>,
}

/// Which envelope a context entry feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    WrapOut,
    WrapErr,
}

/// Writes a finished response to the client.
pub trait Transport {
    fn transmit(&mut self, response: &Response) -> Result<(), BoxError>;
}

/// A response as it left the kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct Transmitted {
    pub status: StatusCode,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Transmitted {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// Keeps the transmitted response in memory.
#[derive(Debug, Default)]
pub struct BufferedTransport {
    sent: Vec<Transmitted>,
}

impl BufferedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Option<Transmitted> {
        self.sent.pop()
    }

    /// How many times something was transmitted.
    pub fn count(&self) -> usize {
        self.sent.len()
    }
}

impl Transport for BufferedTransport {
    fn transmit(&mut self, response: &Response) -> Result<(), BoxError> {
        self.sent.push(Transmitted {
            status: response.status(),
            headers: response.wire_headers(),
            body: response.encoded_body(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    mime: String,
    charset: String,
    headers: BTreeMap<String, String>,
    body: Value,
    error: bool,
    debug: bool,
    sent: bool,
    trace_id: Uuid,
    failure: Option<Failure>,
    wrapout: Map<String, Value>,
    wraperr: Map<String, Value>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            mime: "application/json".to_string(),
            charset: "UTF-8".to_string(),
            headers: BTreeMap::new(),
            body: Value::Null,
            error: false,
            debug: false,
            sent: false,
            trace_id: Uuid::new_v4(),
            failure: None,
            wrapout: Map::new(),
            wraperr: Map::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn set_mime(&mut self, content_type: &str) -> &mut Self {
        self.mime = content_type.to_string();
        self
    }

    /// Set the content type by alias; unknown aliases leave it unchanged.
    pub fn set_mime_alias(&mut self, alias: &str) -> &mut Self {
        if let Some(content_type) = mime::mime(alias) {
            self.mime = content_type.to_string();
        }
        self
    }

    pub fn set_charset(&mut self, charset: &str) -> &mut Self {
        self.charset = charset.to_string();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.remove(&name.to_ascii_lowercase());
        self
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn set_body(&mut self, body: Value) -> &mut Self {
        self.body = body;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn set_error(&mut self, error: bool) -> &mut Self {
        self.error = error;
        self
    }

    /// Debug responses carry failure detail in error bodies.
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.debug = debug;
        self
    }

    /// Correlates the response with log lines.
    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    /// Short-circuit with an expected client-facing condition.
    pub fn abort(&mut self, status: StatusCode, name: &str, context: Value) -> &mut Self {
        self.record(FailureClass::Abort, status, name, context, None)
    }

    /// Reject the request (bad input, unmet precondition).
    pub fn fail(&mut self, status: StatusCode, name: &str, context: Value) -> &mut Self {
        self.record(FailureClass::Fail, status, name, context, None)
    }

    /// Report an internal failure as a 500.
    pub fn exception(&mut self, name: &str, cause: &dyn fmt::Display) -> &mut Self {
        self.record(
            FailureClass::Exception,
            StatusCode::INTERNAL_SERVER_ERROR,
            name,
            Value::Null,
            Some(cause.to_string()),
        )
    }

    fn record(
        &mut self,
        class: FailureClass,
        status: StatusCode,
        name: &str,
        context: Value,
        cause: Option<String>,
    ) -> &mut Self {
        self.status = status;
        self.error = true;
        self.failure = Some(Failure {
            class,
            name: name.to_string(),
            context,
            cause,
        });
        self
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn add_context(&mut self, kind: ContextKind, key: &str, value: Value) -> &mut Self {
        match kind {
            ContextKind::WrapOut => self.wrapout.insert(key.to_string(), value),
            ContextKind::WrapErr => self.wraperr.insert(key.to_string(), value),
        };
        self
    }

    pub fn context(&self, kind: ContextKind) -> &Map<String, Value> {
        match kind {
            ContextKind::WrapOut => &self.wrapout,
            ContextKind::WrapErr => &self.wraperr,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Transmit once. Later calls are no-ops.
    pub fn send(&mut self, transport: &mut dyn Transport) -> Result<(), BoxError> {
        if self.sent {
            return Ok(());
        }
        transport.transmit(self)?;
        self.sent = true;
        Ok(())
    }

    pub fn content_type(&self) -> String {
        format!("{}; charset={}", self.mime, self.charset)
    }

    /// Headers as written to the wire, Content-Type included.
    pub fn wire_headers(&self) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();
        headers.insert("content-type".to_string(), self.content_type());
        headers
    }

    /// Body serialised for the current content type. Null bodies are empty.
    pub fn encoded_body(&self) -> String {
        if self.body.is_null() {
            return String::new();
        }
        mime::encode(&self.body, &self.mime)
    }
}
