//! GIS proxy library.
//!
//! Forwards requests whose destination is embedded, base64 encoded, after a
//! configurable path prefix, and classifies each one against ArcGIS REST and
//! OGC (WMS/WFS/WMTS) service conventions on the way through.

pub mod config;
pub mod error;
pub mod gis;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use gis::ServiceInfo;
pub use http::GisProxy;
pub use lifecycle::ShutdownHandle;
