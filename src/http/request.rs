//! Transport-neutral request model.
//!
//! # Responsibilities
//! - Carry verb, path, headers, query and decoded body into the kernel
//! - Answer case-insensitive header lookups
//! - Expose the request MIME alias for MIMEIN checks

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::http::mime;
use crate::http::verb::Verb;

/// An inbound request as the kernel sees it.
///
/// `verb` is `None` when the transport received a method the kernel does not
/// route; such requests never match.
#[derive(Debug, Clone)]
pub struct Request {
    verb: Option<Verb>,
    path: String,
    headers: BTreeMap<String, String>,
    query: Map<String, Value>,
    body: Map<String, Value>,
    input: Option<Value>,
    client_ip: Option<String>,
    received_at: DateTime<Utc>,
}

impl Request {
    pub fn new(verb: Option<Verb>, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            headers: BTreeMap::new(),
            query: Map::new(),
            body: Map::new(),
            input: None,
            client_ip: None,
            received_at: Utc::now(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Some(Verb::Get), path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Some(Verb::Post), path)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_query(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.query.insert(key.to_string(), value.into());
        self
    }

    pub fn with_query_map(mut self, query: Map<String, Value>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body_map(mut self, body: Map<String, Value>) -> Self {
        self.body = body;
        self
    }

    /// A decoded JSON body: objects populate the keyed body, anything else is
    /// kept as raw input.
    pub fn with_json(mut self, value: Value) -> Self {
        match value {
            Value::Object(map) => self.body = map,
            other => self.input = Some(other),
        }
        if !self.headers.contains_key("content-type") {
            self.headers
                .insert("content-type".to_string(), "application/json".to_string());
        }
        self
    }

    /// Undecoded body text.
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_client_ip(mut self, ip: &str) -> Self {
        self.client_ip = Some(ip.to_string());
        self
    }

    pub fn verb(&self) -> Option<Verb> {
        self.verb
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Case-insensitive; `_` and `-` are interchangeable.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase().replace('_', "-");
        self.headers.get(&name).map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn input(&self) -> Option<&Value> {
        self.input.as_ref()
    }

    /// Query and body merged; body keys win.
    pub fn all(&self) -> Map<String, Value> {
        let mut merged = self.query.clone();
        for (k, v) in &self.body {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Body value, else query value.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.body.get(key).or_else(|| self.query.get(key))
    }

    /// MIME alias of the Content-Type header, when it is a known one.
    pub fn mime(&self) -> Option<&'static str> {
        self.header("content-type").and_then(mime::alias)
    }

    pub fn client_ip(&self) -> Option<&str> {
        self.client_ip.as_deref()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}
