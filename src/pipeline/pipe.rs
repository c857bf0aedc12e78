//! Inbound and outbound pipes.
//!
//! Pipes are named filters attached to ports through PIPEIN / PIPEOUT.
//! Inbound pipes run after routing and before validation; outbound pipes
//! run on the handler's result before it is packed.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::KernelConfig;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::pipeline::context::RouteContext;
use crate::pipeline::stage::Flow;
use crate::pipes::{Paginate, ResponseSupport, RestWrapout, Sorting};
use crate::port::{Output, PortView};
use crate::BoxError;

/// Runs before validation. May stash data on the route, override port
/// settings for this request, or answer the request itself.
pub trait PipeIn: Send + Sync {
    fn pipe_in(
        &self,
        request: &Request,
        response: &mut Response,
        route: &mut RouteContext,
        port: &mut PortView,
    ) -> Result<Flow<()>, BoxError>;
}

/// Transforms the handler's result, or answers the request itself.
pub trait PipeOut: Send + Sync {
    fn pipe_out(
        &self,
        output: Output,
        request: &Request,
        response: &mut Response,
        route: &RouteContext,
        port: &PortView,
    ) -> Result<Flow<Output>, BoxError>;
}

/// Pipes by name.
#[derive(Default, Clone)]
pub struct PipeRegistry {
    inbound: BTreeMap<String, Arc<dyn PipeIn>>,
    outbound: BTreeMap<String, Arc<dyn PipeOut>>,
}

impl PipeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `paginate`, `sorting`, `rest_wrapout` inbound; `response_support` outbound.
    pub fn builtin(config: &KernelConfig) -> Self {
        let mut registry = Self::new();
        registry
            .register_in(Paginate::NAME, Arc::new(Paginate::new(config.paginate.clone())))
            .register_in(Sorting::NAME, Arc::new(Sorting))
            .register_in(RestWrapout::NAME, Arc::new(RestWrapout))
            .register_out(ResponseSupport::NAME, Arc::new(ResponseSupport));
        registry
    }

    pub fn register_in(&mut self, name: &str, pipe: Arc<dyn PipeIn>) -> &mut Self {
        self.inbound.insert(name.to_string(), pipe);
        self
    }

    pub fn register_out(&mut self, name: &str, pipe: Arc<dyn PipeOut>) -> &mut Self {
        self.outbound.insert(name.to_string(), pipe);
        self
    }

    pub fn inbound(&self, name: &str) -> Option<&Arc<dyn PipeIn>> {
        self.inbound.get(name)
    }

    pub fn outbound(&self, name: &str) -> Option<&Arc<dyn PipeOut>> {
        self.outbound.get(name)
    }

    pub fn has_in(&self, name: &str) -> bool {
        self.inbound.contains_key(name)
    }

    pub fn has_out(&self, name: &str) -> bool {
        self.outbound.contains_key(name)
    }
}

/// Names in `attached` not listed in `excluded`, in order.
pub fn effective<'a>(attached: &'a [String], excluded: &'a [String]) -> impl Iterator<Item = &'a str> {
    attached
        .iter()
        .filter(move |name| !excluded.contains(name))
        .map(String::as_str)
}
