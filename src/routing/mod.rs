//! Routing subsystem: from inbound URL to forward target.
//!
//! # Data Flow
//! ```text
//! Inbound URI
//!     → matcher.rs (strip scheme, match prefix, split segment/remainder)
//!     → codec.rs (undo substitutions, base64 decode)
//!     → decoded text + remainder
//!     → url::Url (ForwardTarget)
//! ```

pub mod codec;
pub mod matcher;

pub use matcher::{Prefix, PrefixMatch, PrefixMatcher};

use url::Url;

use crate::error::{ProxyError, Result};

/// Destination recovered from an inbound proxy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Encoded segment as it appeared in the inbound URL.
    pub segment: String,
    /// Trailing path/query appended to the decoded URL.
    pub remainder: String,
    /// The absolute URL the request is forwarded to.
    pub target: Url,
}

/// Compute the forward URL for an inbound request URL.
///
/// Fails with [`ProxyError::RoutingMismatch`] when the prefix is absent and
/// with a decode error when the segment or resulting URL is malformed.
pub fn resolve(matcher: &PrefixMatcher, inbound: &str) -> Result<ResolvedTarget> {
    let PrefixMatch { segment, remainder } =
        matcher
            .match_url(inbound)
            .ok_or_else(|| ProxyError::RoutingMismatch {
                prefix: matcher.prefix().to_string(),
            })?;

    let decoded = codec::decode_segment(segment)?;
    let forward = format!("{decoded}{remainder}");
    let target = Url::parse(&forward).map_err(|e| ProxyError::InvalidTarget {
        target: forward.clone(),
        reason: e.to_string(),
    })?;
    if !target.has_host() {
        return Err(ProxyError::InvalidTarget {
            target: forward,
            reason: "missing host".to_string(),
        });
    }

    Ok(ResolvedTarget {
        segment: segment.to_string(),
        remainder: remainder.to_string(),
        target,
    })
}
