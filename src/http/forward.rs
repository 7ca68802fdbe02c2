//! Forwarding pipeline.
//!
//! # Responsibilities
//! - Build the outbound request (method, target, headers, body)
//! - Run the pre-send hook
//! - Execute on the pooled client
//!
//! # Design Decisions
//! - Only PUT/POST/PATCH carry a body upstream
//! - `Host` is never copied; the client derives it from the target
//! - No retries: a transport failure is final
//! - The deadline covers the wait for the response head, not the body stream

use std::time::Duration;

use axum::http::{header, HeaderMap};
use bytes::Bytes;

use crate::error::ProxyError;
use crate::gis::form::{is_body_method, ForwardBody};
use crate::http::context::RequestContext;
use crate::http::hooks::BeforeSend;

/// Result of the forwarding step, consumed once by the relay.
#[derive(Debug)]
pub enum Outcome {
    /// Upstream answered; relay this response.
    Forward(reqwest::Response),
    /// Answer the caller with a 302 to this location.
    Redirect(String),
    /// A hook produced the full body.
    HandledByHook(Bytes),
    Failure(ProxyError),
}

/// Build the outbound request for `ctx`.
///
/// `Transfer-Encoding` is recomputed by the client. `Content-Length` is kept
/// only for a streamed body; a buffered body declares its own length.
pub fn build_request(
    ctx: &RequestContext,
    headers: &HeaderMap,
    body: ForwardBody,
) -> reqwest::Request {
    let with_body = is_body_method(&ctx.method);
    let keep_length = with_body && matches!(body, ForwardBody::Stream(_));
    let mut request = reqwest::Request::new(ctx.method.clone(), ctx.target.clone());

    let outbound = request.headers_mut();
    for (name, value) in headers.iter() {
        if name == header::HOST || name == header::TRANSFER_ENCODING {
            continue;
        }
        if name == header::CONTENT_LENGTH && !keep_length {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }

    if with_body {
        let body = match body {
            ForwardBody::Buffered(bytes) => reqwest::Body::from(bytes),
            ForwardBody::Stream(stream) => reqwest::Body::wrap_stream(stream.into_data_stream()),
        };
        *request.body_mut() = Some(body);
    }

    request
}

/// Send a request upstream, giving the pre-send hook a chance to intervene.
///
/// Fails with a transport error when the response head has not arrived
/// within `response_timeout`.
pub async fn send(
    client: &reqwest::Client,
    response_timeout: Duration,
    before_send: Option<&dyn BeforeSend>,
    ctx: &RequestContext,
    headers: &HeaderMap,
    body: ForwardBody,
) -> Outcome {
    let mut request = build_request(ctx, headers, body);

    if let Some(hook) = before_send {
        request = match hook.before_send(ctx, request).await.into_result() {
            Ok(request) => request,
            Err(outcome) => {
                log_hook_outcome("Before send", ctx, &outcome);
                return outcome;
            }
        };
    }

    tracing::debug!(
        request_id = %ctx.request_id,
        method = %ctx.method,
        url = %request.url(),
        "Sending upstream request"
    );

    match tokio::time::timeout(response_timeout, client.execute(request)).await {
        Ok(Ok(response)) => Outcome::Forward(response),
        Ok(Err(source)) => Outcome::Failure(ProxyError::transport(ctx.target.as_str(), source)),
        Err(_) => Outcome::Failure(ProxyError::transport(
            ctx.target.as_str(),
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("no response within {response_timeout:?}"),
            ),
        )),
    }
}

/// Redirects and hook-produced bodies are normal results, not errors.
pub(crate) fn log_hook_outcome(stage: &str, ctx: &RequestContext, outcome: &Outcome) {
    match outcome {
        Outcome::Failure(err) => tracing::warn!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            url = %ctx.target,
            error = %err,
            "{stage} hook rejected request"
        ),
        Outcome::Redirect(location) => tracing::debug!(
            request_id = %ctx.request_id,
            location = %location,
            "{stage} hook redirected request"
        ),
        Outcome::HandledByHook(body) => tracing::debug!(
            request_id = %ctx.request_id,
            bytes = body.len(),
            "{stage} hook answered request"
        ),
        Outcome::Forward(_) => {}
    }
}
