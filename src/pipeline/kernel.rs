//! The request kernel.
//!
//! # Data Flow
//! ```text
//! Request
//!     → PREFLIGHT        (cors, debug, ...; in configured order)
//!     → ROUTING          (match → 404, halt → 503, MIMEIN → 400)
//!     → PIPE_IN          (PIPEIN minus NOPIPEIN)
//!     → VALIDATE         (WRAPIN schema or inline arguments → 400)
//!     → BUILD_ARGS       (positional handler parameters)
//!     → INVOKE           (handler method)
//!     → PIPE_OUT         (PIPEOUT minus NOPIPEOUT)
//!     → PACK             (WRAPOUT, CODEOK, INFOOK, STATUSOK, MIMEOUT)
//!     → TERMINATE_HOOKS  (best effort)
//!     → SEND             (error body through WRAPERR, transmit once)
//! ```
//!
//! # Design Decisions
//! - Each stage runs inside its own guard: an error or panic becomes a 500
//!   named after that stage, then the pipeline jumps to SEND
//! - `Flow::Respond` from any collaborator also jumps to SEND
//! - The registry is shared and read-only; request state lives on the stack

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Map, Value};

use crate::assembler::{Assembler, Assembly, AssemblyError};
use crate::config::KernelConfig;
use crate::http::mime;
use crate::http::request::Request;
use crate::http::response::{BufferedTransport, ContextKind, FailureClass, Response, Transmitted, Transport};
use crate::http::wrapper::{Wrapper, WrapperRegistry};
use crate::lifecycle::HaltFlag;
use crate::metadata::HandlerMeta;
use crate::pipeline::context::{RouteContext, Routed};
use crate::pipeline::hooks::{AuditLog, TerminateHook};
use crate::pipeline::pipe::{effective, PipeIn, PipeOut, PipeRegistry};
use crate::pipeline::preflight::{Preflight, PreflightRegistry};
use crate::pipeline::stage::{Flow, Stage, StageOutcome};
use crate::port::{Output, PortCall, PortTable, PortView};
use crate::routing::{Match, Registry, RouteParams};
use crate::validate::{Location, RuleEngine, Validate, ValidateError, ValueSource};
use crate::BoxError;

/// Run one stage; leave the enclosing function on short-circuit or failure.
macro_rules! step {
    ($response:ident, $stage:expr, $body:expr) => {
        match $stage.guard($body) {
            StageOutcome::Continue(value) => value,
            StageOutcome::ShortCircuit => return,
            StageOutcome::Fail(err) => {
                $response.exception(err.stage.tag(), &err.source);
                return;
            }
        }
    };
}

/// Errors that keep a kernel from being built.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("port {0} has no registered handler")]
    HandlerMissing(String),

    #[error("preflight {0} does not exist")]
    PreflightNotExists(String),
}

/// Collects the collaborators of a [`Kernel`].
pub struct KernelBuilder<'a> {
    config: &'a KernelConfig,
    pipes: PipeRegistry,
    preflights: PreflightRegistry,
    wrappers: WrapperRegistry,
    hooks: Vec<Arc<dyn TerminateHook>>,
    validator: Option<Arc<dyn Validate>>,
    halt: Option<Arc<HaltFlag>>,
}

impl<'a> KernelBuilder<'a> {
    /// Built-in pipes, preflights and wrappers, the audit hook, and a halt
    /// flag backed by `kernel.halt_file`.
    pub fn new(config: &'a KernelConfig) -> Self {
        Self {
            config,
            pipes: PipeRegistry::builtin(config),
            preflights: PreflightRegistry::builtin(config),
            wrappers: WrapperRegistry::with_config(&config.wrappers),
            hooks: vec![Arc::new(AuditLog)],
            validator: None,
            halt: None,
        }
    }

    pub fn pipe_in(mut self, name: &str, pipe: Arc<dyn PipeIn>) -> Self {
        self.pipes.register_in(name, pipe);
        self
    }

    pub fn pipe_out(mut self, name: &str, pipe: Arc<dyn PipeOut>) -> Self {
        self.pipes.register_out(name, pipe);
        self
    }

    /// Make a preflight available; `kernel.preflight` decides whether it runs.
    pub fn preflight(mut self, name: &str, preflight: Arc<dyn Preflight>) -> Self {
        self.preflights.register(name, preflight);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn TerminateHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Replace the built-in rule engine.
    pub fn validator(mut self, validator: Arc<dyn Validate>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn halt(mut self, flag: Arc<HaltFlag>) -> Self {
        self.halt = Some(flag);
        self
    }

    /// Assemble `metas` and bind the result to `handlers`.
    pub fn build(self, metas: &[HandlerMeta], handlers: PortTable) -> Result<Kernel, BootError> {
        let config = self.config;
        let Assembly { registry, wrapins } =
            Assembler::new(config, &handlers, &self.pipes, &self.wrappers).assemble(metas)?;

        if let Some(port) = registry
            .ports()
            .find(|port| handlers.get(&port.class, &port.method).is_none())
        {
            return Err(BootError::HandlerMissing(port.target()));
        }

        let preflights = config
            .kernel
            .preflight
            .iter()
            .map(|name| {
                self.preflights
                    .get(name)
                    .cloned()
                    .ok_or_else(|| BootError::PreflightNotExists(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(RuleEngine::new(Arc::new(wrapins))));
        let halt = self
            .halt
            .unwrap_or_else(|| Arc::new(HaltFlag::from_file(&config.kernel.halt_file)));
        let default_wraperr = config
            .domain
            .port_setting("WRAPERR")
            .and_then(Value::as_str)
            .map(str::to_string);

        tracing::info!(
            routes = registry.route_count(),
            ports = registry.port_count(),
            preflights = preflights.len(),
            "Kernel ready"
        );

        Ok(Kernel {
            registry: Arc::new(registry),
            handlers: Arc::new(handlers),
            pipes: self.pipes,
            preflights,
            validator,
            wrappers: self.wrappers,
            hooks: self.hooks,
            halt,
            debug: config.kernel.debug,
            default_wraperr,
        })
    }
}

/// Drives requests through the stage sequence. Cheap to share across workers.
pub struct Kernel {
    registry: Arc<Registry>,
    handlers: Arc<PortTable>,
    pipes: PipeRegistry,
    preflights: Vec<Arc<dyn Preflight>>,
    validator: Arc<dyn Validate>,
    wrappers: WrapperRegistry,
    hooks: Vec<Arc<dyn TerminateHook>>,
    halt: Arc<HaltFlag>,
    debug: bool,
    default_wraperr: Option<String>,
}

impl Kernel {
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn halt_flag(&self) -> &Arc<HaltFlag> {
        &self.halt
    }

    /// Handle one request and transmit the response through `transport`.
    /// Never fails: every outcome becomes a well-formed response.
    pub fn handle(&self, request: Request, transport: &mut dyn Transport) -> Response {
        let mut response = Response::new();
        response.set_debug(self.debug);

        let span = tracing::debug_span!(
            "request",
            trace_id = %response.trace_id(),
            verb = request.verb().map(|v| v.as_str()).unwrap_or("-"),
            path = %request.path(),
        );
        let _guard = span.enter();

        let mut routed = None;
        self.drive(&request, &mut response, &mut routed);
        self.send(&request, &mut response, routed.as_ref(), transport);
        response
    }

    /// Handle one request in memory and return what was transmitted.
    pub fn dispatch(&self, request: Request) -> Transmitted {
        let mut transport = BufferedTransport::new();
        let response = self.handle(request, &mut transport);
        transport.take().unwrap_or_else(|| Transmitted {
            status: response.status(),
            headers: response.wire_headers(),
            body: response.encoded_body(),
        })
    }

    fn drive(&self, request: &Request, response: &mut Response, slot: &mut Option<Routed>) {
        step!(response, Stage::Preflight, || self.preflight(request, response));
        step!(response, Stage::Routing, || self.routing(request, response, slot));
        let Some(Routed { route, port }) = slot.as_mut() else {
            return;
        };

        step!(response, Stage::PipeIn, || self.pipe_in(request, response, route, port));
        let arguments = step!(response, Stage::Validate, || self.validate(request, response, route, port));
        route.set_arguments(arguments);
        let args = step!(response, Stage::BuildArgs, || build_args(route, port));
        let output = step!(response, Stage::Invoke, || self.invoke(args, request, response, route, port));
        let output = step!(response, Stage::PipeOut, || {
            self.pipe_out(output, request, response, route, port)
        });
        step!(response, Stage::Pack, || self.pack(output, response, route, port));
        self.terminate(request, response, route, port);
    }

    fn preflight(&self, request: &Request, response: &mut Response) -> Result<Flow<()>, BoxError> {
        for preflight in &self.preflights {
            if let Flow::Respond = preflight.preflight(request, response)? {
                return Ok(Flow::Respond);
            }
        }
        Ok(Flow::Next(()))
    }

    fn routing(
        &self,
        request: &Request,
        response: &mut Response,
        slot: &mut Option<Routed>,
    ) -> Result<Flow<()>, BoxError> {
        let path = request.path();
        let found = request.verb().and_then(|verb| self.registry.find(path, verb));
        let Some(Match { route, port }) = found else {
            response.abort(
                StatusCode::NOT_FOUND,
                "ROUTE_NOT_FOUND",
                json!({ "verb": request.verb().map(|v| v.as_str()), "path": path }),
            );
            return Ok(Flow::Respond);
        };

        let properties = self.registry.properties(&route.class);
        let routed = slot.insert(Routed {
            route: RouteContext::new(route, properties),
            port: PortView::new(port),
        });
        tracing::debug!(
            port = %routed.port.target(),
            definition = %routed.route.entry().definition,
            params = routed.route.params().len(),
            "Route matched"
        );

        if let Some(notice) = self.halt.current() {
            response.abort(
                StatusCode::SERVICE_UNAVAILABLE,
                &notice.message,
                json!({ "since": notice.since }),
            );
            return Ok(Flow::Respond);
        }

        if let Some(mimein) = routed.port.settings.mimein.as_deref() {
            let mime = request.mime();
            if mime != Some(mimein) {
                response.fail(
                    StatusCode::BAD_REQUEST,
                    "INVALID_REQUEST_MIME",
                    json!({ "mimein": mimein, "mime": mime }),
                );
                return Ok(Flow::Respond);
            }
        }
        Ok(Flow::Next(()))
    }

    fn pipe_in(
        &self,
        request: &Request,
        response: &mut Response,
        route: &mut RouteContext,
        port: &mut PortView,
    ) -> Result<Flow<()>, BoxError> {
        // Pipes may override the port, so iterate over a snapshot.
        let attached = port.settings.pipein.clone();
        let excluded = port.settings.nopipein.clone();
        for name in effective(&attached, &excluded) {
            let pipe = self
                .pipes
                .inbound(name)
                .ok_or_else(|| format!("pipe-in {name} is not registered"))?;
            if let Flow::Respond = pipe.pipe_in(request, response, route, port)? {
                tracing::debug!(pipe = name, "Inbound pipe answered the request");
                return Ok(Flow::Respond);
            }
        }
        Ok(Flow::Next(()))
    }

    fn validate(
        &self,
        request: &Request,
        response: &mut Response,
        route: &RouteContext,
        port: &PortView,
    ) -> Result<Flow<Map<String, Value>>, BoxError> {
        let source = RequestSource::new(request, route.params());
        let result = match port.settings.wrapin.as_deref() {
            Some(wrapin) => self.validator.apply(wrapin, &source),
            None if port.arguments.is_empty() => return Ok(Flow::Next(Map::new())),
            None => self.validator.validate(&port.arguments, &source),
        };
        match result {
            Ok(arguments) => Ok(Flow::Next(arguments)),
            Err(ValidateError::Failure(failure)) => {
                response.fail(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_FAILED",
                    serde_json::to_value(&failure)?,
                );
                Ok(Flow::Respond)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn invoke(
        &self,
        args: Vec<Value>,
        request: &Request,
        response: &mut Response,
        route: &RouteContext,
        port: &PortView,
    ) -> Result<Flow<Output>, BoxError> {
        let entry = route.entry();
        let handler = self
            .handlers
            .get(&entry.class, &entry.method)
            .ok_or_else(|| format!("no handler registered for {}", entry.target()))?;
        let mut call = PortCall {
            request,
            response,
            route,
            port,
        };
        handler.call(&mut call, args)
    }

    fn pipe_out(
        &self,
        mut output: Output,
        request: &Request,
        response: &mut Response,
        route: &RouteContext,
        port: &PortView,
    ) -> Result<Flow<Output>, BoxError> {
        for name in effective(&port.settings.pipeout, &port.settings.nopipeout) {
            let pipe = self
                .pipes
                .outbound(name)
                .ok_or_else(|| format!("pipe-out {name} is not registered"))?;
            match pipe.pipe_out(output, request, response, route, port)? {
                Flow::Next(next) => output = next,
                Flow::Respond => {
                    tracing::debug!(pipe = name, "Outbound pipe answered the request");
                    return Ok(Flow::Respond);
                }
            }
        }
        Ok(Flow::Next(output))
    }

    fn pack(
        &self,
        output: Output,
        response: &mut Response,
        route: &RouteContext,
        port: &PortView,
    ) -> Result<Flow<()>, BoxError> {
        // A failure recorded by the handler is rendered at SEND.
        if response.failure().is_some() {
            return Ok(Flow::Next(()));
        }

        let data = output.into_value();
        let body = if response.is_error() {
            let status = response.status();
            match self.wraperr(Some(port)) {
                Some(wrapper) => wrapper.wrap_err(
                    i64::from(status.as_u16()),
                    status.canonical_reason().unwrap_or("ERROR"),
                    data,
                    response.context(ContextKind::WrapErr),
                ),
                None => data,
            }
        } else {
            if let Some(status) = port.settings.statusok {
                response.set_status(StatusCode::from_u16(status)?);
            }
            match port.settings.wrapout.as_deref() {
                Some(name) => {
                    let wrapper = self
                        .wrappers
                        .get(name)
                        .ok_or_else(|| format!("wrapper {name} is not registered"))?;
                    wrapper.wrap_out(
                        data,
                        port.settings.codeok,
                        port.settings.infook.as_deref(),
                        response.context(ContextKind::WrapOut),
                    )
                }
                None => data,
            }
        };

        response.set_body(body).set_mime_alias(mime_alias(route, port));
        Ok(Flow::Next(()))
    }

    fn terminate(&self, request: &Request, response: &Response, route: &RouteContext, port: &PortView) {
        for hook in &self.hooks {
            let outcome = Stage::TerminateHooks.guard(|| {
                hook.terminate(request, response, route, port).map(Flow::Next)
            });
            if let StageOutcome::Fail(err) = outcome {
                tracing::error!(
                    stage = %err.stage,
                    port = %port.target(),
                    error = %err.source,
                    "Terminate hook failed"
                );
            }
        }
    }

    fn send(
        &self,
        request: &Request,
        response: &mut Response,
        routed: Option<&Routed>,
        transport: &mut dyn Transport,
    ) {
        self.render_failure(request, response, routed);
        let outcome = Stage::Send.guard(|| response.send(&mut *transport).map(Flow::Next));
        let StageOutcome::Fail(err) = outcome else {
            return;
        };

        response.exception(err.stage.tag(), &err.source);
        self.render_failure(request, response, routed);
        if let Err(e) = response.send(transport) {
            tracing::error!(
                trace_id = %response.trace_id(),
                error = %e,
                "Response could not be transmitted"
            );
        }
    }

    /// Turn a recorded failure into its error body and log it by class.
    fn render_failure(&self, request: &Request, response: &mut Response, routed: Option<&Routed>) {
        let Some(failure) = response.failure().cloned() else {
            return;
        };
        let status = response.status().as_u16();
        let verb = request.verb().map(|v| v.as_str()).unwrap_or("-");
        let port = routed.map(|r| r.port.target()).unwrap_or_default();

        let mut detail = vec![Value::String(response.trace_id().to_string())];
        match failure.class {
            FailureClass::Abort => {
                tracing::debug!(status, name = %failure.name, verb, path = %request.path(), "Request aborted");
                detail.push(failure.context.clone());
            }
            FailureClass::Fail => {
                tracing::warn!(
                    status,
                    name = %failure.name,
                    port = %port,
                    verb,
                    path = %request.path(),
                    context = %failure.context,
                    "Request rejected"
                );
                detail.push(failure.context.clone());
            }
            FailureClass::Exception => {
                let cause = failure.cause.as_deref().unwrap_or("-");
                tracing::error!(
                    status,
                    stage = %failure.name,
                    port = %port,
                    verb,
                    path = %request.path(),
                    error = %cause,
                    "Request failed"
                );
                if response.is_debug() {
                    detail.push(Value::String(cause.to_string()));
                }
            }
        }

        let detail = Value::Array(detail);
        let body = match self.wraperr(routed.map(|r| &r.port)) {
            Some(wrapper) => wrapper.wrap_err(
                i64::from(status),
                &failure.name,
                detail,
                response.context(ContextKind::WrapErr),
            ),
            None => json!([status, failure.name, detail]),
        };
        response.set_body(body).set_mime_alias(mime::DEFAULT_ALIAS);
    }

    /// The port's WRAPERR, else the domain-global one.
    fn wraperr(&self, port: Option<&PortView>) -> Option<Arc<Wrapper>> {
        let name = port
            .and_then(|p| p.settings.wraperr.clone())
            .or_else(|| self.default_wraperr.clone())?;
        let wrapper = self.wrappers.get(&name);
        if wrapper.is_none() {
            tracing::warn!(wrapper = %name, "Error wrapper is not registered");
        }
        wrapper
    }
}

/// Route suffix, else MIMEOUT, else JSON.
fn mime_alias<'a>(route: &'a RouteContext, port: &'a PortView) -> &'a str {
    route
        .entry()
        .suffix
        .as_deref()
        .or(port.settings.mimeout.as_deref())
        .unwrap_or(mime::DEFAULT_ALIAS)
}

/// Map declared handler parameters to values: validated argument, then
/// route parameter, then the declared default.
fn build_args(route: &RouteContext, port: &PortView) -> Result<Flow<Vec<Value>>, BoxError> {
    port.parameters
        .iter()
        .map(|param| {
            route
                .argument(&param.name)
                .cloned()
                .or_else(|| route.params().get(&param.name).map(|v| Value::String(v.to_string())))
                .or_else(|| param.default.clone())
                .ok_or_else(|| {
                    BoxError::from(format!(
                        "parameter {} of {} cannot be resolved",
                        param.name,
                        port.target()
                    ))
                })
        })
        .collect::<Result<Vec<_>, BoxError>>()
        .map(Flow::Next)
}

/// Request values by location. `All` prefers body, then query, then route.
struct RequestSource<'a> {
    request: &'a Request,
    params: Map<String, Value>,
}

impl<'a> RequestSource<'a> {
    fn new(request: &'a Request, params: &RouteParams) -> Self {
        let params = params
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        Self { request, params }
    }
}

impl ValueSource for RequestSource<'_> {
    fn lookup(&self, key: &str, location: Location) -> Option<&Value> {
        match location {
            Location::Route => self.params.get(key),
            Location::Query => self.request.query().get(key),
            Location::Body => self.request.body().get(key),
            Location::All => self
                .request
                .body()
                .get(key)
                .or_else(|| self.request.query().get(key))
                .or_else(|| self.params.get(key)),
        }
    }
}
