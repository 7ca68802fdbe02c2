//! Encoded destination URLs.
//!
//! A destination is embedded in the inbound path as standard base64 in which
//! the three characters that do not survive a path segment are written in
//! their query-string escaped form:
//!
//! ```text
//! '+'  <->  "%2B"
//! '/'  <->  "%2F"
//! '='  <->  "%3D"
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{ProxyError, Result};

const SUBSTITUTIONS: [(&str, &str); 3] = [("+", "%2B"), ("/", "%2F"), ("=", "%3D")];

/// Encode an absolute URL into a path segment understood by the proxy.
pub fn encode(url: &str) -> String {
    let mut segment = STANDARD.encode(url.as_bytes());
    for (raw, escaped) in SUBSTITUTIONS {
        segment = segment.replace(raw, escaped);
    }
    segment
}

/// Undo the path substitutions and return the plain base64 text.
pub fn unescape_segment(segment: &str) -> String {
    let mut b64 = segment.to_string();
    for (raw, escaped) in SUBSTITUTIONS {
        b64 = b64.replace(escaped, raw);
        // Some clients emit lowercase hex digits in escapes.
        b64 = b64.replace(&escaped.to_ascii_lowercase(), raw);
    }
    b64
}

/// Decode an encoded segment back into the destination URL text.
pub fn decode_segment(segment: &str) -> Result<String> {
    let b64 = unescape_segment(segment);
    let bytes = STANDARD.decode(b64.as_bytes()).map_err(|e| ProxyError::Decode {
        segment: b64.clone(),
        reason: e.to_string(),
    })?;
    String::from_utf8(bytes).map_err(|e| ProxyError::Decode {
        segment: b64,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_segment_has_no_path_separators() {
        // "??>" encodes to "Pz8+", "???" to "Pz8/"
        let segment = encode("https://example.com/a??>???");
        assert!(!segment.contains('/'));
        assert!(!segment.contains('+'));
        assert!(!segment.contains('='));
        assert!(segment.contains("%2B"));
        assert!(segment.contains("%2F"));
    }

    #[test]
    fn decode_restores_url() {
        let urls = [
            "https://example.com/arcgis/rest/services/Roads/MapServer/export",
            "http://10.0.0.5:8080/geoserver/wms?service=WMS&request=GetCapabilities",
            "https://example.com/a??>???",
            "https://example.com/x",
        ];
        for url in urls {
            assert_eq!(decode_segment(&encode(url)).unwrap(), url);
        }
    }

    #[test]
    fn unescape_accepts_lowercase_escapes() {
        assert_eq!(unescape_segment("ab%2Bcd%2Fef%3D"), "ab+cd/ef=");
        assert_eq!(unescape_segment("ab%2bcd%2fef%3d"), "ab+cd/ef=");
    }

    #[test]
    fn invalid_base64_reports_segment() {
        let err = decode_segment("not*base64").unwrap_err();
        match &err {
            ProxyError::Decode { segment, .. } => assert_eq!(segment, "not*base64"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("not*base64"));
    }

    #[test]
    fn non_utf8_payload_is_a_decode_error() {
        let segment = STANDARD.encode([0xff, 0xfe, 0xfd]);
        assert!(matches!(
            decode_segment(&segment),
            Err(ProxyError::Decode { .. })
        ));
    }
}
