//! Entry-point HTTP servers and the request hot path.
//!
//! # Responsibilities
//! - One axum server per configured entry point
//! - Match each request against the live routing table snapshot
//! - Circuit-breaker admission, server selection, forwarding
//! - Retry transport failures on a different server, bounded by the
//!   configured attempt cap
//! - Report every attempt's outcome to the health and breaker state
//!
//! # Design Decisions
//! - The table snapshot is taken once per request: a request observes the
//!   table live at its start or a newer one, never a torn mix
//! - A valid HTTP response — any status — is passed through, never retried
//! - Bodies are buffered for replay only when provably small; otherwise the
//!   request streams and gets a single attempt

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header, request::Parts, uri::Scheme, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::{ForwardingConfig, TimeoutConfig};
use crate::health::passive;
use crate::http::request::{RequestIdLayer, X_REQUEST_ID};
use crate::http::response;
use crate::load_balancer::server::PoolServer;
use crate::load_balancer::RequestOutcome;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::Admission;
use crate::resilience::retries;
use crate::routing::TableSwitch;

/// Shared upstream client: pooled connections, connect timeout applied at
/// the connector so a dead server fails fast.
pub fn upstream_client(timeouts: &TimeoutConfig) -> Client<HttpConnector, Body> {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
    Client::builder(TokioExecutor::new()).build(connector)
}

/// State injected into the proxy handler.
#[derive(Clone)]
pub struct ProxyState {
    pub entry_point: String,
    pub switch: Arc<TableSwitch>,
    pub client: Client<HttpConnector, Body>,
    pub forwarding: ForwardingConfig,
    pub attempt_timeout: Duration,
}

/// One listening entry point serving the live routing table.
pub struct EntryPointServer {
    name: String,
    router: Router,
}

impl EntryPointServer {
    pub fn new(
        name: impl Into<String>,
        switch: Arc<TableSwitch>,
        client: Client<HttpConnector, Body>,
        forwarding: ForwardingConfig,
        timeouts: &TimeoutConfig,
    ) -> Self {
        let name = name.into();
        let state = ProxyState {
            entry_point: name.clone(),
            switch,
            client,
            forwarding,
            attempt_timeout: Duration::from_secs(timeouts.attempt_secs),
        };

        let router = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http());

        Self { name, router }
    }

    /// Serve until the shutdown signal fires. In-flight requests drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(entry_point = %self.name, address = %addr, "Entry point listening");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(entry_point = %self.name, "Entry point stopped");
        Ok(())
    }
}

/// A request body positioned for forwarding.
enum AttemptBody {
    /// Replayable: cloned for every attempt.
    Buffered(Bytes),
    /// One-shot: taken by the single allowed attempt.
    Stream(Option<Body>),
}

/// The proxy hot path: match, admit, select, forward, retry, report.
async fn proxy_handler(
    State(state): State<ProxyState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let table = state.switch.current();
    let Some(route) = table.match_request(&state.entry_point, &request).cloned() else {
        tracing::debug!(
            request_id = %request_id,
            entry_point = %state.entry_point,
            path = %path,
            "No route matched"
        );
        metrics::record_routing_miss(&state.entry_point);
        metrics::record_request(method.as_str(), 404, "none", start);
        return response::routing_miss();
    };
    let pool = route.pool.clone();

    let admission = pool.admit();
    if admission == Admission::Rejected {
        tracing::debug!(request_id = %request_id, backend = %pool.name(), "Circuit open, failing fast");
        metrics::record_request(method.as_str(), 503, pool.name(), start);
        return response::circuit_open();
    }

    let (mut parts, body) = request.into_parts();
    let original_host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    response::strip_hop_by_hop(&mut parts.headers);
    response::apply_forwarding_headers(&mut parts.headers, client_addr.ip(), original_host.as_deref());

    let mut attempt_body =
        if retries::can_buffer(&method, &parts.headers, state.forwarding.retry_buffer_limit) {
            match axum::body::to_bytes(body, state.forwarding.retry_buffer_limit).await {
                Ok(bytes) => AttemptBody::Buffered(bytes),
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Failed to buffer request body");
                    return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large to buffer")
                        .into_response();
                }
            }
        } else {
            AttemptBody::Stream(Some(body))
        };

    let max_attempts = match attempt_body {
        AttemptBody::Buffered(_) => state.forwarding.max_attempts.max(1),
        AttemptBody::Stream(_) => 1,
    };

    let mut tried: Vec<String> = Vec::new();
    let mut attempt = 0;
    loop {
        attempt += 1;

        let server = match pool.select(&tried) {
            Ok(server) => server,
            Err(e) => {
                tracing::debug!(request_id = %request_id, backend = %pool.name(), error = %e, "No server available");
                metrics::record_request(method.as_str(), 503, pool.name(), start);
                return response::no_available_server();
            }
        };
        tried.push(server.key().to_string());

        let body = match &mut attempt_body {
            AttemptBody::Buffered(bytes) => Body::from(bytes.clone()),
            AttemptBody::Stream(slot) => slot.take().expect("streamed body is sent exactly once"),
        };
        let upstream = build_upstream_request(&parts, &server, body);

        let attempt_start = Instant::now();
        let failure = match tokio::time::timeout(state.attempt_timeout, state.client.request(upstream)).await
        {
            Ok(Ok(upstream_response)) => {
                let status = upstream_response.status();
                pool.report(
                    &server,
                    admission,
                    RequestOutcome {
                        healthy: !passive::status_is_failure(status),
                        breaker_ok: !passive::status_is_breaker_error(status),
                        latency: attempt_start.elapsed(),
                    },
                );
                metrics::record_request(method.as_str(), status.as_u16(), server.key(), start);

                let (mut resp_parts, resp_body) = upstream_response.into_parts();
                response::strip_hop_by_hop(&mut resp_parts.headers);
                return Response::from_parts(resp_parts, Body::new(resp_body));
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "attempt deadline exceeded".to_string(),
        };

        // Transport-level failure: report it and maybe go around again.
        pool.report(
            &server,
            admission,
            RequestOutcome {
                healthy: false,
                breaker_ok: false,
                latency: attempt_start.elapsed(),
            },
        );

        if attempt < max_attempts {
            tracing::info!(
                request_id = %request_id,
                attempt,
                server = %server.key(),
                error = %failure,
                "Transient upstream failure, retrying on another server"
            );
            metrics::record_retry(pool.name());
            continue;
        }

        tracing::error!(
            request_id = %request_id,
            attempts = attempt,
            server = %server.key(),
            error = %failure,
            "Upstream attempts exhausted"
        );
        metrics::record_request(method.as_str(), 502, server.key(), start);
        return response::upstream_failed();
    }
}

/// Rewrite the request URI at the chosen server, keeping path and query.
fn build_upstream_request(parts: &Parts, server: &PoolServer, body: Body) -> Request<Body> {
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(server.authority().clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(axum::http::uri::PathAndQuery::from_static("/"));
    }
    let uri = Uri::from_parts(uri_parts).unwrap_or_else(|_| parts.uri.clone());

    let mut builder = Request::builder().method(parts.method.clone()).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in parts.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
    }
    builder
        .body(body)
        .expect("request parts were valid before the rewrite")
}
