//! Per-request metadata threaded through the pipeline.

use axum::http::{HeaderValue, Method, Uri};
use url::Url;

use crate::gis::ServiceInfo;

/// Everything known about one proxied request before it is sent.
///
/// Built once after decoding and classification, then passed by reference
/// to the forwarding step, both hooks and the relay.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Value of the `x-request-id` header set at the edge.
    pub request_id: String,
    pub method: Method,
    /// URI as received from the caller.
    pub inbound_uri: Uri,
    /// Decoded destination.
    pub target: Url,
    pub service: ServiceInfo,
    /// `Origin` header of the inbound request, used for CORS.
    pub origin: Option<HeaderValue>,
}
