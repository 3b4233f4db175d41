//! HTTP transport adapter using Axum.
//!
//! Every path except `GET /health` is handed to the [`Dispatcher`]. Results are
//! written as:
//!
//! - success: `200`, JSON [`ResponseEnvelope`](crate::envelope::ResponseEnvelope)
//! - handler failure: `200`, `qrpc_code: -1` and `qrpc_message`, no body
//! - transport failure: `200`, `qrpc_code: -2` and `qrpc_message`, no body

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Span};

use crate::config::{parse_bind_addr, ServerConfig};
use crate::dispatch::{Dispatcher, Outcome};
use crate::envelope::{FailureCode, CODE_HEADER, MESSAGE_HEADER};
use crate::error::{LrpcError, Result};
use crate::registry::{Registry, Service};

/// State shared by every request task.
struct AppState {
    dispatcher: Dispatcher,
    max_body_bytes: usize,
    span: Span,
}

/// RPC server: a handler registry bound to an HTTP listener.
///
/// Handlers are registered with [`Server::register`] before serving. The
/// serving methods consume the server, after which the registry is shared
/// read-only between request tasks.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    registry: Registry,
    span: Span,
}

impl Server {
    pub fn new(bind: impl Into<String>) -> Self {
        Self::from_config(ServerConfig::new(bind))
    }

    pub fn from_config(config: ServerConfig) -> Self {
        let span = info_span!("lrpc", bind = %config.bind);
        Self {
            registry: Registry::new().with_span(span.clone()),
            config,
            span,
        }
    }

    /// Attach the server's and registry's events to `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.registry.set_span(span.clone());
        self.span = span;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register every handler of `service`.
    pub fn register<S: Service>(&mut self, service: Arc<S>) -> &mut Self {
        self.registry.register(service);
        self
    }

    /// Build the router, freezing the registry.
    pub fn router(self) -> Router {
        let dispatcher = Dispatcher::new(Arc::new(self.registry)).with_span(self.span.clone());
        let state = Arc::new(AppState {
            dispatcher,
            max_body_bytes: self.config.max_body_bytes,
            span: self.span,
        });

        Router::new()
            .route("/health", get(handle_health).fallback(handle_call))
            .fallback(handle_call)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Serve until the listener fails.
    ///
    /// Bind failures are returned as [`LrpcError::Bind`]. Nothing is retried.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves or the listener fails.
    ///
    /// In-flight calls finish before this returns.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        let span = self.span.clone();
        info!(parent: &span, "server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!(parent: &span, "server stopped");
        Ok(())
    }

    /// Bind and serve in a background task.
    ///
    /// Returns the actual bound address (useful with port 0).
    pub async fn start(self) -> Result<ServerHandle> {
        let listener = self.bind().await?;
        let addr = listener.local_addr()?;
        let span = self.span.clone();
        info!(parent: &span, "server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = self.router();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = &result {
                error!(parent: &span, "server error: {}", e);
            }
            result.map_err(LrpcError::from)
        });

        Ok(ServerHandle {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    async fn bind(&self) -> Result<TcpListener> {
        let addr = parse_bind_addr(&self.config.bind)?;
        TcpListener::bind(addr)
            .await
            .map_err(|source| LrpcError::Bind {
                addr: self.config.bind.clone(),
                source,
            })
    }
}

/// Handle to a server started with [`Server::start`]. Dropping it stops the server.
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<Result<()>>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL for clients, e.g. `http://127.0.0.1:40123`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections. In-flight calls are allowed to finish.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Shut down and wait for the serving task to finish.
    pub async fn stop(mut self) -> Result<()> {
        self.shutdown();
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| LrpcError::Io(std::io::Error::other(e.to_string())))?,
            None => Ok(()),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Health check endpoint.
async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Dispatch one call and map its outcome onto the response.
async fn handle_call(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let path = request.uri().path().to_string();

    let body = match axum::body::to_bytes(request.into_body(), state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            let err = LrpcError::ReadBody {
                message: e.to_string(),
            };
            return transport_failure(&state, &path, err);
        }
    };

    match state.dispatcher.dispatch(&path, &body) {
        Ok(Outcome::Success(envelope)) => match serde_json::to_vec(&envelope) {
            Ok(bytes) => (
                StatusCode::OK,
                [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                bytes,
            )
                .into_response(),
            Err(e) => transport_failure(&state, &path, LrpcError::Encode(e)),
        },
        Ok(Outcome::Failed { message }) => failure_response(FailureCode::Call, &message),
        Err(e) => transport_failure(&state, &path, e),
    }
}

fn transport_failure(state: &AppState, path: &str, err: LrpcError) -> Response {
    warn!(parent: &state.span, "request process err {}: {}", path, err);
    failure_response(FailureCode::Transport, &err.to_string())
}

fn failure_response(code: FailureCode, message: &str) -> Response {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(CODE_HEADER),
        HeaderValue::from(code.as_i32()),
    );
    headers.insert(HeaderName::from_static(MESSAGE_HEADER), header_value(message));
    response
}

/// Header-safe form of `message`: control characters become spaces.
fn header_value(message: &str) -> HeaderValue {
    let cleaned: String = message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    HeaderValue::from_bytes(cleaned.as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("unprintable error message"))
}
