//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{HeaderMap, Method, Uri},
    response::IntoResponse,
    routing::any,
    Json, Router,
};
use gis_proxy::config::ProxyConfig;
use gis_proxy::http::{BeforeSend, HookVerdict, RequestContext};
use gis_proxy::routing::codec;
use gis_proxy::{GisProxy, ServiceInfo, ShutdownHandle};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a backend that answers every request with a JSON description of it.
///
/// The response also carries `x-upstream: echo` and two `x-multi` values.
pub async fn start_echo_backend() -> SocketAddr {
    let app = Router::new().fallback(any(echo));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    if uri.path().ends_with("/slow") {
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    let header_pairs: Vec<Value> = headers
        .iter()
        .map(|(k, v)| json!([k.as_str(), v.to_str().unwrap_or_default()]))
        .collect();
    let mut response = Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": header_pairs,
        "body": String::from_utf8_lossy(&body),
    }))
    .into_response();
    let h = response.headers_mut();
    h.insert("x-upstream", "echo".parse().unwrap());
    h.append("x-multi", "one".parse().unwrap());
    h.append("x-multi", "two".parse().unwrap());
    response
}

/// Start a backend that writes a fixed raw HTTP response and counts requests.
pub async fn start_raw_backend(response: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    (addr, hits)
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Config for a proxy on an ephemeral local port.
pub fn test_config(prefix: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.proxy.prefix = prefix.to_string();
    config
}

/// Start `proxy` in the background and wait until it is bound.
pub async fn start_proxy(proxy: GisProxy) -> (SocketAddr, ShutdownHandle) {
    let handle = proxy.shutdown_handle();
    tokio::spawn(async move {
        let _ = proxy.start().await;
    });
    let addr = tokio::time::timeout(Duration::from_secs(5), handle.listening())
        .await
        .expect("proxy did not start in time")
        .expect("proxy failed to bind");
    (addr, handle)
}

/// Path addressing `target` through a proxy using `prefix`.
pub fn proxy_path(prefix: &str, target: &str, rest: &str) -> String {
    format!("{prefix}{}{rest}", codec::encode(target))
}

/// Client that never follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// Pre-send hook recording the classification of every request.
#[derive(Clone, Default)]
pub struct RecordingHook {
    pub seen: Arc<Mutex<Vec<ServiceInfo>>>,
}

impl RecordingHook {
    pub fn last(&self) -> Option<ServiceInfo> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl BeforeSend for RecordingHook {
    async fn before_send(
        &self,
        ctx: &RequestContext,
        request: reqwest::Request,
    ) -> HookVerdict<reqwest::Request> {
        self.seen.lock().unwrap().push(ctx.service.clone());
        HookVerdict::Continue(request)
    }
}

/// Header values the echo backend reported for `name`.
pub fn echoed_header(echo: &Value, name: &str) -> Vec<String> {
    echo["headers"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|pair| pair[0].as_str() == Some(name))
        .map(|pair| pair[1].as_str().unwrap().to_string())
        .collect()
}
