//! Protocol-aware request classification.
//!
//! Detection order, first match wins:
//! 1. ArcGIS `/services/<name>/MapServer`
//! 2. ArcGIS `/services/<name>/FeatureServer`
//! 3. ArcGIS `/services/<name>/ImageServer`
//! 4. OGC `service=` parameter in the form body or the query string
//!
//! Classification is best effort and never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::info::{ServiceInfo, ARCGIS};

static ARCGIS_SERVICES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)/services/(.+)/mapserver/?", "MapServer"),
        (r"(?i)/services/(.+)/featureserver/?", "FeatureServer"),
        (r"(?i)/services/(.+)/imageserver/?", "ImageServer"),
    ]
    .into_iter()
    .map(|(source, kind)| (Regex::new(source).expect("static pattern"), kind))
    .collect()
});

const REST_SERVICES: &str = "/rest/services/";
const SERVICES: &str = "/services/";

/// Classify a forward target.
///
/// `form` holds the decoded form body parameters of the inbound request, if
/// any were sniffed; they are consulted before the query string.
pub fn classify(target: &Url, form: &[(String, String)]) -> ServiceInfo {
    classify_arcgis(target)
        .or_else(|| classify_ogc(target, form))
        .unwrap_or_default()
}

fn classify_arcgis(target: &Url) -> Option<ServiceInfo> {
    let path = target.path();
    let (name, kind) = ARCGIS_SERVICES.iter().find_map(|(pattern, kind)| {
        pattern
            .captures(path)
            .and_then(|c| c.get(1))
            .map(|m| (m.as_str().to_string(), *kind))
    })?;

    Some(ServiceInfo {
        server_url: arcgis_server_url(target.as_str()),
        server_type: ARCGIS.to_string(),
        service_type: kind.to_string(),
        service_name: name,
    })
}

/// Truncate after the first `/rest/services/`, ignoring case.
fn arcgis_server_url(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    let end = lower
        .find(REST_SERVICES)
        .map(|idx| idx + REST_SERVICES.len())
        .or_else(|| lower.find(SERVICES).map(|idx| idx + SERVICES.len()))
        .unwrap_or(url.len());
    url[..end].to_string()
}

fn classify_ogc(target: &Url, form: &[(String, String)]) -> Option<ServiceInfo> {
    let params: Vec<(String, String)> = form
        .iter()
        .cloned()
        .chain(
            target
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        )
        .collect();

    let service = params
        .iter()
        .find(|(key, value)| key.eq_ignore_ascii_case("service") && !value.is_empty())
        .map(|(_, value)| value.to_uppercase())?;

    let service_name = name_parameters(&service)
        .iter()
        .find_map(|name| joined_values(&params, name))
        .unwrap_or_default();

    let url = target.as_str();
    let server_url = url.split('?').next().unwrap_or(url).to_string();

    Some(ServiceInfo {
        server_url,
        server_type: service.clone(),
        service_type: service,
        service_name,
    })
}

/// Parameters naming the addressed layer(s), in order of preference.
fn name_parameters(service: &str) -> &'static [&'static str] {
    match service {
        "WMS" => &["layers", "query_layers"],
        "WMTS" => &["layer"],
        "WFS" => &["typenames", "typename"],
        _ => &[],
    }
}

fn joined_values(params: &[(String, String)], name: &str) -> Option<String> {
    let values: Vec<&str> = params
        .iter()
        .filter(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(","))
    }
}
