//! Axum transport adapter for the kernel.
//!
//! # Responsibilities
//! - Create the Axum Router with a single catch-all handler
//! - Wire up middleware (tracing)
//! - Convert each axum request into a kernel [`Request`]
//! - Run the kernel on a blocking worker, one isolated response per request
//! - Convert the transmitted response back into an axum response
//! - Stop accepting on shutdown and drain in-flight requests

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequest, Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response as AxumResponse},
    routing::any,
    Form, Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::ListenerConfig;
use crate::http::mime;
use crate::http::request::Request;
use crate::http::response::Transmitted;
use crate::http::verb::Verb;
use crate::pipeline::Kernel;

/// Failures of the transport around the kernel. The kernel itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request body unreadable: {0}")]
    Body(#[source] axum::Error),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("kernel worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    fn status(&self) -> StatusCode {
        match self {
            TransportError::Body(_) => StatusCode::PAYLOAD_TOO_LARGE,
            TransportError::Malformed(_) => StatusCode::BAD_REQUEST,
            TransportError::Worker(_) | TransportError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> AxumResponse {
        (self.status(), self.to_string()).into_response()
    }
}

/// Application state injected into the handler.
#[derive(Clone)]
struct AppState {
    kernel: Arc<Kernel>,
    max_body_bytes: usize,
}

/// HTTP server hosting a [`Kernel`].
pub struct KernelServer {
    router: Router,
}

impl KernelServer {
    pub fn new(kernel: Arc<Kernel>, listener: &ListenerConfig) -> Self {
        let state = AppState {
            kernel,
            max_body_bytes: listener.max_body_bytes,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(kernel_handler))
            .route("/", any(kernel_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for serving elsewhere or driving with `oneshot` in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), TransportError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn kernel_handler(State(state): State<AppState>, request: axum::extract::Request) -> AxumResponse {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    match serve(state, peer, request).await {
        Ok(transmitted) => into_axum(transmitted),
        Err(err) => {
            tracing::warn!(error = %err, "Request rejected by transport");
            err.into_response()
        }
    }
}

async fn serve(
    state: AppState,
    peer: Option<SocketAddr>,
    request: axum::extract::Request,
) -> Result<Transmitted, TransportError> {
    let request = into_kernel(request, peer, state.max_body_bytes).await?;
    let kernel = state.kernel;
    let transmitted = tokio::task::spawn_blocking(move || kernel.dispatch(request)).await?;
    Ok(transmitted)
}

/// Decode an axum request into the kernel's request model.
///
/// Unknown methods map to `verb = None` and therefore never match a route.
/// JSON bodies are decoded, form bodies become the keyed body, anything else
/// is kept as raw text input.
pub async fn into_kernel(
    request: axum::extract::Request,
    peer: Option<SocketAddr>,
    max_body_bytes: usize,
) -> Result<Request, TransportError> {
    let verb = request.method().as_str().parse::<Verb>().ok();
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .map_err(|rejection| TransportError::Malformed(rejection.body_text()))?;

    let mut converted = Request::new(verb, request.uri().path());
    for (key, value) in pairs {
        converted = converted.with_query(&key, value);
    }
    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            converted = converted.with_header(name.as_str(), value);
        }
    }
    if let Some(addr) = peer {
        converted = converted.with_client_ip(&addr.ip().to_string());
    }

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(TransportError::Body)?;
    if bytes.is_empty() {
        return Ok(converted);
    }

    match content_type.as_deref().and_then(mime::alias) {
        Some("json") => {
            let value: Value = serde_json::from_slice(&bytes)
                .map_err(|err| TransportError::Malformed(err.to_string()))?;
            Ok(converted.with_json(value))
        }
        Some("form") => {
            let rebuilt = axum::extract::Request::from_parts(parts, Body::from(bytes));
            let Form(fields) = Form::<Vec<(String, String)>>::from_request(rebuilt, &())
                .await
                .map_err(|rejection| TransportError::Malformed(rejection.body_text()))?;
            let body = fields
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect();
            Ok(converted.with_body_map(body))
        }
        _ => Ok(converted.with_input(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))),
    }
}

/// Build the axum response for what the kernel transmitted.
pub fn into_axum(transmitted: Transmitted) -> AxumResponse {
    let mut response = (transmitted.status, transmitted.body).into_response();
    let headers = response.headers_mut();
    for (name, value) in &transmitted.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping header not representable on the wire"),
        }
    }
    response
}
