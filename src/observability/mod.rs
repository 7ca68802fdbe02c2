//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline produces:
//!     → logging.rs (structured log events, request ID on every line)
//!     → metrics.rs (counters, histograms labelled by GIS service)
//! ```

pub mod logging;
pub mod metrics;
