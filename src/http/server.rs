//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Hold the proxy instance configuration (prefix, CORS, TLS, hooks)
//! - Create Axum Router with the proxy handler and middleware
//! - Bind the listener (plain or TLS) and serve until shutdown
//! - Dispatch each request: decode → classify → send → relay

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    response::Response,
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;
use tower_http::trace::TraceLayer;

use crate::config::{ProxyConfig, TlsConfig};
use crate::error::{ProxyError, Result};
use crate::gis;
use crate::http::client::build_upstream_client;
use crate::http::context::RequestContext;
use crate::http::forward;
use crate::http::hooks::{AfterReceive, BeforeSend};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::response::Relay;
use crate::lifecycle::ShutdownHandle;
use crate::net::tls::load_listener_tls;
use crate::observability::metrics;
use crate::routing::{self, Prefix, PrefixMatcher};

/// Shared, read-only state seen by every request.
struct ProxyState {
    matcher: PrefixMatcher,
    allow_cross_origin: bool,
    max_form_body_bytes: usize,
    client: reqwest::Client,
    response_timeout: Duration,
    next: Option<Router>,
    before_send: Option<Arc<dyn BeforeSend>>,
    after_receive: Option<Arc<dyn AfterReceive>>,
}

/// The GIS proxy instance.
///
/// Configure it with the setters, then call [`GisProxy::start`]. Starting
/// consumes the instance, so configuration cannot change while serving.
pub struct GisProxy {
    bind_address: String,
    prefix: Prefix,
    allow_cross_origin: bool,
    tls: Option<TlsConfig>,
    max_form_body_bytes: usize,
    request_timeout: Duration,
    client: reqwest::Client,
    next: Option<Router>,
    before_send: Option<Arc<dyn BeforeSend>>,
    after_receive: Option<Arc<dyn AfterReceive>>,
    shutdown: ShutdownHandle,
}

impl GisProxy {
    /// Create a proxy from configuration.
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let client = build_upstream_client(&config.upstream)?;
        Ok(Self {
            bind_address: config.listener.bind_address.clone(),
            prefix: Prefix::new(&config.proxy.prefix),
            allow_cross_origin: config.proxy.allow_cross_origin,
            tls: config.listener.tls.clone(),
            max_form_body_bytes: config.proxy.max_form_body_bytes,
            request_timeout: Duration::from_secs(config.proxy.request_timeout_secs),
            client,
            next: None,
            before_send: None,
            after_receive: None,
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Set the prefix; it is normalized to start and end with `/`.
    pub fn set_prefix(&mut self, prefix: impl AsRef<str>) {
        self.prefix = Prefix::new(prefix);
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn set_allow_cross_origin(&mut self, allow: bool) {
        self.allow_cross_origin = allow;
    }

    /// Router serving requests that do not carry the prefix.
    pub fn set_next_handler(&mut self, next: Router) {
        self.next = Some(next);
    }

    pub fn set_before_send(&mut self, hook: impl BeforeSend + 'static) {
        self.before_send = Some(Arc::new(hook));
    }

    pub fn set_after_receive(&mut self, hook: impl AfterReceive + 'static) {
        self.after_receive = Some(Arc::new(hook));
    }

    /// Serve HTTPS with the given PEM certificate and key.
    pub fn use_https(&mut self, cert_path: impl Into<String>, key_path: impl Into<String>) {
        self.tls = Some(TlsConfig {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
    }

    /// Handle to stop the server once started.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        let state = Arc::new(ProxyState {
            matcher: PrefixMatcher::new(self.prefix.clone()),
            allow_cross_origin: self.allow_cross_origin,
            max_form_body_bytes: self.max_form_body_bytes,
            client: self.client.clone(),
            response_timeout: self.request_timeout,
            next: self.next.clone(),
            before_send: self.before_send.clone(),
            after_receive: self.after_receive.clone(),
        });

        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Bind and serve until the shutdown handle stops the server.
    ///
    /// The bind address may name a host; every resolved address is tried in
    /// turn until one binds.
    pub async fn start(self) -> Result<()> {
        let listener = bind_listener(&self.bind_address).await?;
        let addr = listener.local_addr().map_err(|source| ProxyError::Bind {
            addr: self.bind_address.clone(),
            source,
        })?;

        tracing::info!(
            address = %addr,
            prefix = %self.prefix,
            allow_cross_origin = self.allow_cross_origin,
            https = self.tls.is_some(),
            "Starting GIS proxy"
        );

        let app = self.router().into_make_service();
        let handle = self.shutdown.server_handle();
        let served = match &self.tls {
            Some(tls) => {
                let rustls = load_listener_tls(tls).await.map_err(ProxyError::Tls)?;
                axum_server::tls_rustls::from_tcp_rustls(listener, rustls)
                    .handle(handle)
                    .serve(app)
                    .await
            }
            None => axum_server::from_tcp(listener).handle(handle).serve(app).await,
        };
        served.map_err(|source| ProxyError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        tracing::info!("GIS proxy stopped");
        Ok(())
    }
}

/// Resolve `bind_address` and bind the first address that accepts.
async fn bind_listener(bind_address: &str) -> Result<std::net::TcpListener> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(bind_address)
        .await
        .map_err(|e| {
            ProxyError::Config(format!("cannot resolve bind address {bind_address}: {e}"))
        })?
        .collect();
    if addrs.is_empty() {
        return Err(ProxyError::Config(format!(
            "bind address {bind_address} resolved to no addresses"
        )));
    }

    let bind_error = |source: std::io::Error| ProxyError::Bind {
        addr: bind_address.to_string(),
        source,
    };
    let listener = std::net::TcpListener::bind(&addrs[..]).map_err(bind_error)?;
    listener.set_nonblocking(true).map_err(bind_error)?;
    Ok(listener)
}

/// Main proxy handler.
async fn proxy_handler(State(state): State<Arc<ProxyState>>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request.request_id();
    let method = request.method().clone();
    let inbound = request.uri().to_string();
    let origin = request.headers().get(header::ORIGIN).cloned();

    // 1. Decode
    let resolved = match routing::resolve(&state.matcher, &inbound) {
        Ok(resolved) => resolved,
        Err(err) => {
            if let (ProxyError::RoutingMismatch { .. }, Some(next)) = (&err, &state.next) {
                tracing::debug!(
                    request_id = %request_id,
                    uri = %inbound,
                    "Not a proxy request, using next handler"
                );
                return next
                    .clone()
                    .oneshot(request)
                    .await
                    .unwrap_or_else(|never| match never {});
            }
            let relay = Relay::new(
                &request_id,
                &method,
                &inbound,
                origin.as_ref(),
                state.allow_cross_origin,
            );
            return unclassified_failure(&relay, &method, &err, start_time);
        }
    };

    // 2. Classify, peeking at form bodies
    let (parts, body) = request.into_parts();
    let sniffed = gis::sniff(&method, &parts.headers, body, state.max_form_body_bytes).await;
    let (form, body) = match sniffed {
        Ok(sniffed) => sniffed,
        Err(err) => {
            let relay = Relay::new(
                &request_id,
                &method,
                resolved.target.as_str(),
                origin.as_ref(),
                state.allow_cross_origin,
            );
            return unclassified_failure(&relay, &method, &err, start_time);
        }
    };
    let service = gis::classify(&resolved.target, &form);

    tracing::info!(
        request_id = %request_id,
        method = %method,
        url = %resolved.target,
        server_type = %service.server_type,
        service_type = %service.service_type,
        service_name = %service.service_name,
        "Proxying request"
    );

    let ctx = RequestContext {
        request_id,
        method,
        inbound_uri: parts.uri.clone(),
        target: resolved.target,
        service,
        origin,
    };

    // 3. Send
    let outcome = forward::send(
        &state.client,
        state.response_timeout,
        state.before_send.as_deref(),
        &ctx,
        &parts.headers,
        body,
    )
    .await;

    // 4. Relay
    let response = Relay::for_context(&ctx, state.allow_cross_origin)
        .relay(&ctx, state.after_receive.as_deref(), outcome)
        .await;

    let status = response.status().as_u16();
    metrics::record_request(ctx.method.as_str(), status, &ctx.service, start_time);
    response
}

/// Failure response for a request that never reached classification.
fn unclassified_failure(
    relay: &Relay<'_>,
    method: &axum::http::Method,
    err: &ProxyError,
    start_time: Instant,
) -> Response {
    let response = relay.failure(err);
    let status = response.status().as_u16();
    metrics::record_request(method.as_str(), status, &gis::ServiceInfo::default(), start_time);
    response
}
