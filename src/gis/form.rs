//! Form body sniffing.
//!
//! OGC clients often POST `service=`/`layers=` as a form instead of a query
//! string. Such bodies are buffered so they can be parsed for classification
//! and then forwarded byte-for-byte.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, FromRequest, Multipart},
    http::{header, HeaderMap, Method, Request},
};
use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt};
use tower::{service_fn, Layer, ServiceExt};
use url::form_urlencoded;

use crate::error::{ProxyError, Result};

const URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";

/// Inbound body as handed to the forwarding step.
#[derive(Debug)]
pub enum ForwardBody {
    /// Fully read while sniffing; these exact bytes are forwarded.
    Buffered(Bytes),
    /// Untouched inbound stream.
    Stream(Body),
}

/// Form parameters recovered from a request body, in body order.
pub type FormParams = Vec<(String, String)>;

/// Whether the body of `method` is forwarded and may hold form parameters.
pub fn is_body_method(method: &Method) -> bool {
    *method == Method::PUT || *method == Method::POST || *method == Method::PATCH
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormKind {
    UrlEncoded,
    Multipart,
}

fn form_kind(headers: &HeaderMap) -> Option<FormKind> {
    let content_type = headers
        .get(header::CONTENT_TYPE)?
        .to_str()
        .ok()?
        .to_ascii_lowercase();
    if content_type.starts_with(URLENCODED) {
        Some(FormKind::UrlEncoded)
    } else if content_type.starts_with(MULTIPART) {
        Some(FormKind::Multipart)
    } else {
        None
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Peek at a form body, returning its parameters and the body to forward.
///
/// Only PUT/POST/PATCH bodies with a form content type are read, at most
/// `limit` bytes of them. A body declared larger than `limit` is passed
/// through untouched; one that turns out larger while reading is forwarded
/// as the bytes already read followed by the rest of the stream. Either way
/// it yields no parameters.
pub async fn sniff(
    method: &Method,
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<(FormParams, ForwardBody)> {
    if !is_body_method(method) {
        return Ok((Vec::new(), ForwardBody::Stream(body)));
    }
    let Some(kind) = form_kind(headers) else {
        return Ok((Vec::new(), ForwardBody::Stream(body)));
    };
    if declared_length(headers).is_some_and(|len| len > limit) {
        tracing::debug!(limit, "Form body not sniffed, declared length over limit");
        return Ok((Vec::new(), ForwardBody::Stream(body)));
    }

    let bytes = match read_bounded(body, limit).await? {
        Peeked::Complete(bytes) => bytes,
        Peeked::Overflow(body) => {
            tracing::debug!(limit, "Form body not sniffed, stream over limit");
            return Ok((Vec::new(), ForwardBody::Stream(body)));
        }
    };

    let params = match kind {
        FormKind::UrlEncoded => parse_urlencoded(&bytes),
        FormKind::Multipart => parse_multipart(headers, bytes.clone()).await,
    };
    Ok((params, ForwardBody::Buffered(bytes)))
}

enum Peeked {
    /// The whole body, no longer than the limit.
    Complete(Bytes),
    /// Everything read so far chained with the unread remainder.
    Overflow(Body),
}

async fn read_bounded(body: Body, limit: usize) -> Result<Peeked> {
    let mut rest = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut total = 0usize;

    while let Some(chunk) = rest.next().await {
        let chunk = chunk.map_err(|e| ProxyError::RequestBody(e.to_string()))?;
        total += chunk.len();
        chunks.push(chunk);
        if total > limit {
            let read = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
            return Ok(Peeked::Overflow(Body::from_stream(read.chain(rest))));
        }
    }

    let mut bytes = BytesMut::with_capacity(total);
    for chunk in chunks {
        bytes.extend_from_slice(&chunk);
    }
    Ok(Peeked::Complete(bytes.freeze()))
}

fn parse_urlencoded(bytes: &[u8]) -> FormParams {
    form_urlencoded::parse(bytes)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Text fields of a multipart body. File parts are skipped; a malformed
/// body yields whatever fields were read before the error.
async fn parse_multipart(headers: &HeaderMap, bytes: Bytes) -> FormParams {
    let Some(content_type) = headers.get(header::CONTENT_TYPE).cloned() else {
        return Vec::new();
    };
    // The extractor enforces its own body limit; the body is already bounded.
    let limit = bytes.len();
    let request = match Request::builder()
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes))
    {
        Ok(r) => r,
        Err(_) => return Vec::new(),
    };

    let reader = DefaultBodyLimit::max(limit).layer(service_fn(|request: Request<Body>| async move {
        Ok::<_, Infallible>(multipart_text_fields(request).await)
    }));
    reader
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {})
}

async fn multipart_text_fields(request: Request<Body>) -> FormParams {
    let mut params = Vec::new();
    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "Multipart body not parsed");
            return params;
        }
    };

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.file_name().is_some() {
                    continue;
                }
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                match field.text().await {
                    Ok(value) => params.push((name, value)),
                    Err(e) => {
                        tracing::debug!(error = %e, "Multipart field not read");
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Multipart body truncated");
                break;
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str, len: usize) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        h.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        h
    }

    fn chunked(content_type: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        h.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        h
    }

    fn streamed(parts: &[&'static str]) -> Body {
        let chunks: Vec<std::result::Result<Bytes, std::io::Error>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        Body::from_stream(stream::iter(chunks))
    }

    async fn buffered(body: ForwardBody) -> Bytes {
        match body {
            ForwardBody::Buffered(b) => b,
            ForwardBody::Stream(_) => panic!("expected buffered body"),
        }
    }

    #[tokio::test]
    async fn urlencoded_body_is_parsed_and_kept() {
        let raw = "SERVICE=WFS&typeName=topp%3Astates&request=GetFeature";
        let (params, body) = sniff(
            &Method::POST,
            &headers("application/x-www-form-urlencoded; charset=UTF-8", raw.len()),
            Body::from(raw),
            1024,
        )
        .await
        .unwrap();

        assert_eq!(params[0], ("SERVICE".to_string(), "WFS".to_string()));
        assert_eq!(params[1], ("typeName".to_string(), "topp:states".to_string()));
        assert_eq!(buffered(body).await, Bytes::from(raw));
    }

    #[tokio::test]
    async fn multipart_text_fields_are_parsed() {
        let raw = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"service\"\r\n\r\n\
            WMS\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"layers\"\r\n\r\n\
            roads\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            ignored\r\n\
            --XyZ--\r\n";
        let (params, body) = sniff(
            &Method::POST,
            &headers("multipart/form-data; boundary=XyZ", raw.len()),
            Body::from(raw),
            4096,
        )
        .await
        .unwrap();

        assert_eq!(
            params,
            vec![
                ("service".to_string(), "WMS".to_string()),
                ("layers".to_string(), "roads".to_string()),
            ]
        );
        assert_eq!(buffered(body).await, Bytes::from(raw));
    }

    #[tokio::test]
    async fn get_body_is_not_sniffed() {
        let (params, body) = sniff(
            &Method::GET,
            &headers(URLENCODED, 9),
            Body::from("service=x"),
            1024,
        )
        .await
        .unwrap();
        assert!(params.is_empty());
        assert!(matches!(body, ForwardBody::Stream(_)));
    }

    #[tokio::test]
    async fn json_body_is_not_sniffed() {
        let (params, body) = sniff(
            &Method::POST,
            &headers("application/json", 2),
            Body::from("{}"),
            1024,
        )
        .await
        .unwrap();
        assert!(params.is_empty());
        assert!(matches!(body, ForwardBody::Stream(_)));
    }

    #[tokio::test]
    async fn oversized_body_streams_through() {
        let (params, body) = sniff(
            &Method::POST,
            &headers(URLENCODED, 10_000),
            Body::from("service=WMS"),
            16,
        )
        .await
        .unwrap();
        assert!(params.is_empty());
        assert!(matches!(body, ForwardBody::Stream(_)));
    }

    #[tokio::test]
    async fn chunked_form_without_length_is_parsed() {
        let (params, body) = sniff(
            &Method::POST,
            &chunked(URLENCODED),
            streamed(&["service=WMS&", "layers=roads"]),
            1024,
        )
        .await
        .unwrap();

        assert_eq!(
            params,
            vec![
                ("service".to_string(), "WMS".to_string()),
                ("layers".to_string(), "roads".to_string()),
            ]
        );
        assert_eq!(buffered(body).await, Bytes::from("service=WMS&layers=roads"));
    }

    #[tokio::test]
    async fn chunked_form_over_limit_keeps_every_byte() {
        let (params, body) = sniff(
            &Method::POST,
            &chunked(URLENCODED),
            streamed(&["service=WMS&", "layers=", "roads,rivers"]),
            16,
        )
        .await
        .unwrap();

        assert!(params.is_empty());
        let ForwardBody::Stream(stream) = body else {
            panic!("expected streamed body");
        };
        let forwarded = axum::body::to_bytes(stream, usize::MAX).await.unwrap();
        assert_eq!(forwarded, Bytes::from("service=WMS&layers=roads,rivers"));
    }

    #[tokio::test]
    async fn multipart_beyond_extractor_default_limit_is_parsed() {
        let filler = "x".repeat(3 * 1024 * 1024);
        let raw = format!(
            "--XyZ\r\n\
            Content-Disposition: form-data; name=\"comment\"\r\n\r\n\
            {filler}\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"service\"\r\n\r\n\
            WFS\r\n\
            --XyZ--\r\n"
        );
        let (params, _) = sniff(
            &Method::POST,
            &headers("multipart/form-data; boundary=XyZ", raw.len()),
            Body::from(raw),
            4 * 1024 * 1024,
        )
        .await
        .unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(params[1], ("service".to_string(), "WFS".to_string()));
    }
}
