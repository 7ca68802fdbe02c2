//! Service classification result.

use serde::Serialize;

/// Value used for server and service type when nothing matched.
pub const UNKNOWN: &str = "unknown";

/// Server type reported for ArcGIS REST services.
pub const ARCGIS: &str = "ArcGIS";

/// Which GIS service a forwarded request addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    /// Base URL of the GIS server (empty when unknown).
    pub server_url: String,
    /// `ArcGIS`, the OGC service name (`WMS`, `WFS`, `WMTS`, ...) or `unknown`.
    pub server_type: String,
    /// `MapServer`, `FeatureServer`, `ImageServer`, the OGC service name or `unknown`.
    pub service_type: String,
    /// Service or layer name(s), comma separated (empty when unknown).
    pub service_name: String,
}

impl ServiceInfo {
    pub fn is_known(&self) -> bool {
        self.server_type != UNKNOWN
    }
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            server_type: UNKNOWN.to_string(),
            service_type: UNKNOWN.to_string(),
            service_name: String::new(),
        }
    }
}

impl std::fmt::Display for ServiceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GisInfo ServerURL={} ServerType={} ServiceType={} ServiceName={}",
            self.server_url, self.server_type, self.service_type, self.service_name
        )
    }
}
