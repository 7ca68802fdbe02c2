//! Shutdown coordination for the proxy.

use std::net::SocketAddr;
use std::time::Duration;

use axum_server::Handle;

/// Controls a running [`GisProxy`](crate::http::GisProxy) listener.
///
/// Cloneable; every clone addresses the same server.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    handle: Handle,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            handle: Handle::new(),
        }
    }

    /// Stop accepting connections and let in-flight requests finish.
    ///
    /// Connections still open after `timeout` are closed forcibly.
    pub fn stop(&self, timeout: Duration) {
        tracing::info!(
            timeout_secs = timeout.as_secs_f64(),
            active_connections = self.handle.connection_count(),
            "Graceful shutdown requested"
        );
        self.handle.graceful_shutdown(Some(timeout));
    }

    /// Wait until the server is bound. `None` if it failed to start.
    pub async fn listening(&self) -> Option<SocketAddr> {
        self.handle.listening().await
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.handle.connection_count()
    }

    pub(crate) fn server_handle(&self) -> Handle {
        self.handle.clone()
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
