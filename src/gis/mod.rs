//! GIS service classification.
//!
//! # Data Flow
//! ```text
//! ForwardTarget (+ inbound method, headers, body)
//!     → form.rs (buffer and parse form bodies of PUT/POST/PATCH)
//!     → classifier.rs (ArcGIS path patterns, then OGC `service=` parameter)
//!     → ServiceInfo (attached to the RequestContext)
//! ```

pub mod classifier;
pub mod form;
pub mod info;

pub use classifier::classify;
pub use form::{sniff, ForwardBody, FormParams};
pub use info::ServiceInfo;
