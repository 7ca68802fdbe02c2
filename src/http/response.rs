//! Response relay.
//!
//! # Responsibilities
//! - Run the post-receive hook
//! - Turn an upstream 302 into a redirect for the original caller
//! - Copy status and headers, add CORS headers, stream the body
//! - Map failures to plain-text error responses
//!
//! # Design Decisions
//! - Bodies are streamed, never buffered
//! - Once streaming started the status is fixed; body errors are only logged
//! - `Access-Control-Allow-Credentials` is never combined with a wildcard origin

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::TryStreamExt;

use crate::error::ProxyError;
use crate::http::context::RequestContext;
use crate::http::forward::{log_hook_outcome, Outcome};
use crate::http::hooks::AfterReceive;

/// Methods advertised in `Access-Control-Allow-Methods`.
pub const ALLOWED_METHODS: &str = "GET, PUT, POST, HEAD, TRACE, DELETE, PATCH, COPY, LINK, OPTIONS";

/// Set CORS headers for a response to a request with the given `Origin`.
pub fn apply_cors(headers: &mut HeaderMap, origin: Option<&HeaderValue>) {
    match origin.filter(|o| !o.is_empty()) {
        Some(origin) => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        None => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
            headers.remove(header::ACCESS_CONTROL_ALLOW_CREDENTIALS);
        }
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
}

/// Writes the caller-facing response for one request.
#[derive(Debug, Clone, Copy)]
pub struct Relay<'a> {
    request_id: &'a str,
    method: &'a Method,
    url: &'a str,
    origin: Option<&'a HeaderValue>,
    allow_cross_origin: bool,
}

impl<'a> Relay<'a> {
    pub fn new(
        request_id: &'a str,
        method: &'a Method,
        url: &'a str,
        origin: Option<&'a HeaderValue>,
        allow_cross_origin: bool,
    ) -> Self {
        Self {
            request_id,
            method,
            url,
            origin,
            allow_cross_origin,
        }
    }

    pub fn for_context(ctx: &'a RequestContext, allow_cross_origin: bool) -> Self {
        Self::new(
            &ctx.request_id,
            &ctx.method,
            ctx.target.as_str(),
            ctx.origin.as_ref(),
            allow_cross_origin,
        )
    }

    /// Relay the outcome of the forwarding step, running the post-receive hook.
    pub async fn relay(
        &self,
        ctx: &RequestContext,
        after_receive: Option<&dyn AfterReceive>,
        outcome: Outcome,
    ) -> Response {
        let mut upstream = match outcome {
            Outcome::Forward(response) => response,
            other => return self.respond(other),
        };

        if let Some(hook) = after_receive {
            upstream = match hook.after_receive(ctx, upstream).await.into_result() {
                Ok(response) => response,
                Err(outcome) => {
                    log_hook_outcome("After receive", ctx, &outcome);
                    return self.respond(outcome);
                }
            };
        }

        if upstream.status() == StatusCode::FOUND {
            let location = upstream
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if let Some(location) = location {
                return self.redirect(&location);
            }
        }

        self.stream(upstream)
    }

    /// Render a final outcome; an upstream response is streamed without hooks.
    pub fn respond(&self, outcome: Outcome) -> Response {
        match outcome {
            Outcome::Forward(upstream) => self.stream(upstream),
            Outcome::Redirect(location) => self.redirect(&location),
            Outcome::HandledByHook(body) => self.handled(body),
            Outcome::Failure(err) => self.failure(&err),
        }
    }

    fn stream(&self, upstream: reqwest::Response) -> Response {
        let status = upstream.status();
        let mut headers = upstream.headers().clone();

        let request_id = self.request_id.to_string();
        let method = self.method.to_string();
        let url = self.url.to_string();
        let body = upstream.bytes_stream().inspect_err(move |e| {
            tracing::error!(
                request_id = %request_id,
                method = %method,
                url = %url,
                error = %e,
                "Copy response error"
            );
        });

        self.cors(&mut headers);
        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }

    fn redirect(&self, location: &str) -> Response {
        let Ok(value) = HeaderValue::from_str(location) else {
            return self.failure(&ProxyError::InvalidTarget {
                target: location.to_string(),
                reason: "redirect location is not a valid header value".to_string(),
            });
        };
        let mut response = StatusCode::FOUND.into_response();
        response.headers_mut().insert(header::LOCATION, value);
        self.cors(response.headers_mut());
        response
    }

    fn handled(&self, body: Bytes) -> Response {
        let mut response = (StatusCode::OK, body).into_response();
        self.cors(response.headers_mut());
        response
    }

    /// Plain-text error response carrying the error message.
    pub fn failure(&self, err: &ProxyError) -> Response {
        let status = err.status();
        match err {
            ProxyError::Hook { .. } => {}
            _ => tracing::error!(
                request_id = %self.request_id,
                method = %self.method,
                url = %self.url,
                status = status.as_u16(),
                error = %err,
                "Error"
            ),
        }
        let mut response = (status, err.to_string()).into_response();
        self.cors(response.headers_mut());
        response
    }

    fn cors(&self, headers: &mut HeaderMap) {
        if self.allow_cross_origin {
            apply_cors(headers, self.origin);
        }
    }
}
