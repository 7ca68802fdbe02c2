//! Pooled upstream HTTP client.

use reqwest::{redirect, Client};

use crate::config::UpstreamConfig;
use crate::error::{ProxyError, Result};

/// Build the client shared by every forwarded request.
///
/// Redirects are never followed: a 3xx is returned to the relay as is.
/// Certificate validation is skipped when `accept_invalid_certs` is set, since
/// GIS servers are often deployed behind self-signed or internal CA certs.
/// HTTP/2 is negotiated through ALPN when the upstream offers it.
pub fn build_upstream_client(config: &UpstreamConfig) -> Result<Client> {
    if config.accept_invalid_certs {
        tracing::debug!("Upstream certificate validation disabled");
    }
    Client::builder()
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .connect_timeout(config.connect_timeout())
        .tcp_keepalive(config.keepalive())
        .pool_idle_timeout(config.idle_timeout())
        .pool_max_idle_per_host(config.max_idle_per_host)
        .redirect(redirect::Policy::none())
        .build()
        .map_err(|e| ProxyError::Config(format!("upstream client: {e}")))
}
