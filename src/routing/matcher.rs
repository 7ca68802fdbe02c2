//! Prefix matching.
//!
//! # Responsibilities
//! - Normalize the configured prefix (leading and trailing `/`)
//! - Isolate the encoded segment and the trailing path/query
//!
//! # Design Decisions
//! - The prefix is escaped before it is compiled, so it always matches literally
//! - Matching is unanchored: an HTTP/2 absolute URI still carries its authority
//!   after the scheme is stripped

use regex::Regex;

/// A normalized path prefix, always starting and ending with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix(String);

impl Prefix {
    /// Normalize a raw prefix. An empty prefix becomes `/`.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let mut prefix = raw.as_ref().trim().to_string();
        if !prefix.starts_with('/') {
            prefix.insert(0, '/');
        }
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Prefix {
    fn default() -> Self {
        Self("/".to_string())
    }
}

impl std::fmt::Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The pieces of an inbound URL that carry a proxied destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMatch<'a> {
    /// First path component after the prefix, still encoded.
    pub segment: &'a str,
    /// Whatever followed the segment (`/rest/of/path?query`), possibly empty.
    pub remainder: &'a str,
}

/// Matches inbound URLs against `(<prefix>)([^/?]+)([/?]?.*)?`.
#[derive(Debug, Clone)]
pub struct PrefixMatcher {
    prefix: Prefix,
    pattern: Regex,
}

impl PrefixMatcher {
    pub fn new(prefix: Prefix) -> Self {
        let source = format!(r"({})([^/?]+)([/?]?.*)?", regex::escape(prefix.as_str()));
        let pattern = Regex::new(&source).expect("escaped prefix is always a valid pattern");
        Self { prefix, pattern }
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// Split an inbound URL into encoded segment and remainder.
    ///
    /// Returns `None` when the request is not a proxy request.
    pub fn match_url<'a>(&self, url: &'a str) -> Option<PrefixMatch<'a>> {
        let url = strip_scheme(url);
        let captures = self.pattern.captures(url)?;
        let segment = captures.get(2)?.as_str();
        if segment.is_empty() {
            return None;
        }
        let remainder = captures.get(3).map(|m| m.as_str()).unwrap_or("");
        Some(PrefixMatch { segment, remainder })
    }
}

/// Drop a leading `scheme://`.
///
/// Only a separator within the first ten characters counts, so a `://`
/// inside an embedded destination is left alone.
pub fn strip_scheme(url: &str) -> &str {
    match url.find("://") {
        Some(idx) if idx < 10 => &url[idx + 3..],
        _ => url,
    }
}
