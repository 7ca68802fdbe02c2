//! Error types for the GIS proxy.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that can occur while routing, forwarding or relaying a request.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The inbound request does not carry the configured prefix.
    #[error("Prefix {prefix} not found in request")]
    RoutingMismatch { prefix: String },

    /// The encoded segment is not valid transformed base64 or not UTF-8.
    #[error("Base64 decoding error for {segment}: {reason}")]
    Decode { segment: String, reason: String },

    /// The decoded destination is not a usable absolute URL.
    #[error("Invalid forward URL {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    /// A pre-send or post-receive hook rejected the request.
    #[error("{} ({})", .message, .status.as_u16())]
    Hook { status: StatusCode, message: String },

    /// The upstream could not be reached or did not answer in time.
    #[error("Requesting server {url} error: {}", error_chain(.source.as_ref()))]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    #[error("Proxy bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS configuration error: {0}")]
    Tls(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    pub fn transport(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ProxyError::Transport {
            url: url.into(),
            source: source.into(),
        }
    }

    /// HTTP status surfaced to the original caller for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Hook { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for errors caused by the shape of the inbound URL.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            ProxyError::Decode { .. } | ProxyError::InvalidTarget { .. }
        )
    }
}

/// Boxed cause carried by [`ProxyError::Transport`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// `err` followed by each of its sources, joined with `: `.
///
/// reqwest keeps the actual cause (refused connection, DNS, TLS) in the
/// source chain and leaves it out of its own message.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(err);
    while let Some(e) = current {
        let text = e.to_string();
        if !parts.last().is_some_and(|last| last.contains(&text)) {
            parts.push(text);
        }
        current = e.source();
    }
    parts.join(": ")
}

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
