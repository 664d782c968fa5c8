//! HTTP boundary.
//!
//! Owns the listener, the `POST /__new/` registration endpoint and the
//! catch-all dispatch handler that replays stored mock responses.

use crate::definition::{MockDefinition, ResponseSpec};
use crate::matcher::{Dispatch, Dispatcher, RequestDescriptor};
use crate::store::MockStore;
use anyhow::Context;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared handler state: the store, the dispatcher over it and the request
/// counters.
pub struct ServerState {
    store: Arc<MockStore>,
    dispatcher: Dispatcher,
    /// Total requests dispatched against the store.
    requests_total: AtomicU64,
    /// Total requests answered by a mock definition.
    requests_matched: AtomicU64,
    /// Total requests that matched nothing.
    requests_unmatched: AtomicU64,
}

impl ServerState {
    fn new(store: Arc<MockStore>) -> Self {
        Self {
            dispatcher: Dispatcher::new(store.clone()),
            store,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    /// The store this server registers into and dispatches from.
    pub fn store(&self) -> &Arc<MockStore> {
        &self.store
    }

    /// Get total requests dispatched.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get total requests matched.
    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    /// Get total requests unmatched.
    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }
}

/// The mock server: a TCP listener plus the shared handler state.
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl Server {
    /// Bind the listener and prepare the handler state. Port 0 picks a free
    /// port; the effective address is available through [`Server::addr`].
    pub async fn bind(addr: SocketAddr, store: Arc<MockStore>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("bind TCP listener")?;
        let addr = listener
            .local_addr()
            .context("get listener socket address")?;
        Ok(Self {
            listener,
            addr,
            state: Arc::new(ServerState::new(store)),
        })
    }

    /// Returns the socket address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Handle to the shared state, for introspection.
    pub fn state(&self) -> Arc<ServerState> {
        self.state.clone()
    }

    /// Accept connections until a shutdown signal arrives.
    pub async fn run(self) -> anyhow::Result<()> {
        let Server {
            listener,
            addr,
            state,
        } = self;
        info!(addr = %addr, "Mock server listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, _) = accepted.context("accept TCP connection")?;
                    let state = state.clone();
                    tokio::spawn(async move {
                        let state = &state;
                        let service = service_fn(move |req: Request<Incoming>| async move {
                            Ok::<_, Infallible>(handle(state, req).await)
                        });

                        if let Err(err) = http1::Builder::new()
                            .keep_alive(true)
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            debug!(error = %err, "Error while serving HTTP connection");
                        }
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    return Ok(());
                }
            }
        }
    }
}

/// Top-level request handler. Internal faults become a plain 500 and every
/// response carries the permissive CORS header.
async fn handle(state: &ServerState, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let mut response = match route(state, req).await {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "Request handling failed");
            let mut response =
                Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    };
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

async fn route(state: &ServerState, req: Request<Incoming>) -> anyhow::Result<Response<Full<Bytes>>> {
    if req.method() == Method::OPTIONS
        && req.headers().contains_key("access-control-request-method")
    {
        return preflight(req.headers());
    }

    let path = req.uri().path();
    if req.method() == Method::POST && (path == "/__new" || path == "/__new/") {
        register(state, req).await
    } else {
        dispatch(state, &req)
    }
}

/// CORS preflight short-circuit; these never reach the dispatcher.
fn preflight(headers: &HeaderMap) -> anyhow::Result<Response<Full<Bytes>>> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ACCESS_CONTROL_ALLOW_METHODS, "GET,HEAD,PUT,PATCH,POST,DELETE");
    if let Some(requested) = headers.get("access-control-request-headers") {
        builder = builder.header(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
    }
    Ok(builder.body(Full::new(Bytes::new()))?)
}

/// `POST /__new/`: parse, validate and insert a mock definition.
async fn register(
    state: &ServerState,
    req: Request<Incoming>,
) -> anyhow::Result<Response<Full<Bytes>>> {
    let body = req
        .into_body()
        .collect()
        .await
        .context("read request body")?
        .to_bytes();

    let def: MockDefinition = match serde_json::from_slice(&body) {
        Ok(def) => def,
        Err(err) => {
            warn!(error = %err, "Rejecting malformed mock definition");
            return json_response(
                StatusCode::BAD_REQUEST,
                &serde_json::json!({ "error": err.to_string() }),
            );
        }
    };

    if let Err(err) = def.validate() {
        warn!(error = %err, "Rejecting invalid mock definition");
        return json_response(
            StatusCode::BAD_REQUEST,
            &serde_json::json!({ "error": err.to_string() }),
        );
    }

    let key = state.store().insert(def);
    info!(key = %key, "Mock created");
    json_response(
        StatusCode::CREATED,
        &serde_json::json!({ "status": "Mock created" }),
    )
}

/// Catch-all: resolve the request against the store and replay the response.
fn dispatch(state: &ServerState, req: &Request<Incoming>) -> anyhow::Result<Response<Full<Bytes>>> {
    state.requests_total.fetch_add(1, Ordering::Relaxed);

    let descriptor = RequestDescriptor {
        method: req.method().as_str().to_string(),
        path: req.uri().path().to_string(),
        headers: collect_headers(req.headers()),
    };

    match state.dispatcher.dispatch(descriptor) {
        Dispatch::Matched(def) => {
            state.requests_matched.fetch_add(1, Ordering::Relaxed);
            info!(
                method = %def.request.method,
                path = %def.request.url,
                "Request matched mock definition"
            );
            render(&def.response)
        }
        Dispatch::NotFound(desc) => {
            state.requests_unmatched.fetch_add(1, Ordering::Relaxed);
            warn!(method = %desc.method, path = %desc.path, "No matching mock definition");
            json_response(
                StatusCode::NOT_FOUND,
                &serde_json::json!({
                    "error": "No matching mock definition found",
                    "request": {
                        "method": desc.method,
                        "path": desc.path,
                        "headers": desc.headers,
                    },
                }),
            )
        }
    }
}

/// Flatten the observed headers to single values; the first value wins.
fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).to_string());
    }
    map
}

/// Render a response template onto the wire: status, headers, then the body
/// (raw text as-is, structured values as JSON).
fn render(response: &ResponseSpec) -> anyhow::Result<Response<Full<Bytes>>> {
    let body = match &response.body {
        Some(body) => body.to_bytes().context("serialize response body")?,
        None => Vec::new(),
    };

    let mut builder = Response::builder().status(StatusCode::from_u16(response.status)?);

    // An explicit Content-Type wins over the one inferred from the body shape.
    let content_type = response
        .headers
        .get("content-type")
        .or_else(|| response.headers.get("Content-Type"))
        .cloned()
        .or_else(|| {
            response
                .body
                .as_ref()
                .map(|b| b.content_type().to_string())
        });
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }

    for (name, value) in &response.headers {
        if name.to_lowercase() != "content-type" {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }

    Ok(builder.body(Full::new(Bytes::from(body)))?)
}

fn json_response(
    status: StatusCode,
    value: &serde_json::Value,
) -> anyhow::Result<Response<Full<Bytes>>> {
    let body = serde_json::to_vec(value)?;
    Ok(Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))?)
}
