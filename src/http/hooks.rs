//! Extension points around the upstream call.
//!
//! A [`BeforeSend`] hook sees the outbound request after headers and body
//! were copied; an [`AfterReceive`] hook sees the upstream response before
//! it is relayed. Both may replace the value or end the request early.

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;

use crate::error::ProxyError;
use crate::http::context::RequestContext;
use crate::http::forward::Outcome;

/// What a hook decided.
#[derive(Debug)]
pub enum HookVerdict<T> {
    /// Keep going with this (possibly modified) value.
    Continue(T),
    /// Send the caller a 302 to this location instead.
    Redirect(String),
    /// The hook produced the full response body; answer 200 with it.
    Respond(Bytes),
    /// Fail the request with this status.
    Reject { status: StatusCode, message: String },
}

impl<T> HookVerdict<T> {
    pub fn reject(status: StatusCode, message: impl Into<String>) -> Self {
        HookVerdict::Reject {
            status,
            message: message.into(),
        }
    }

    /// Split into the value to continue with or the final outcome.
    pub(crate) fn into_result(self) -> Result<T, Outcome> {
        match self {
            HookVerdict::Continue(value) => Ok(value),
            HookVerdict::Redirect(location) => Err(Outcome::Redirect(location)),
            HookVerdict::Respond(body) => Err(Outcome::HandledByHook(body)),
            HookVerdict::Reject { status, message } => {
                Err(Outcome::Failure(ProxyError::Hook { status, message }))
            }
        }
    }
}

/// Runs before the request is sent upstream.
#[async_trait]
pub trait BeforeSend: Send + Sync {
    async fn before_send(
        &self,
        ctx: &RequestContext,
        request: reqwest::Request,
    ) -> HookVerdict<reqwest::Request>;
}

/// Runs after the upstream response headers arrived.
#[async_trait]
pub trait AfterReceive: Send + Sync {
    async fn after_receive(
        &self,
        ctx: &RequestContext,
        response: reqwest::Response,
    ) -> HookVerdict<reqwest::Response>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_map_to_outcomes() {
        assert!(matches!(HookVerdict::Continue(1).into_result(), Ok(1)));

        let redirect = HookVerdict::<()>::Redirect("https://login.example".into()).into_result();
        assert!(matches!(redirect, Err(Outcome::Redirect(ref l)) if l == "https://login.example"));

        let handled = HookVerdict::<()>::Respond(Bytes::from_static(b"cached")).into_result();
        assert!(matches!(handled, Err(Outcome::HandledByHook(ref b)) if b == "cached"));

        match HookVerdict::<()>::reject(StatusCode::FORBIDDEN, "denied").into_result() {
            Err(Outcome::Failure(err)) => assert_eq!(err.status(), StatusCode::FORBIDDEN),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
