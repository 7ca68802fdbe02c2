//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → routing (decode forward target) → gis (classify)
//!     → context.rs (RequestContext for this request)
//!     → forward.rs (build outbound request, BeforeSend hook, pooled client)
//!     → response.rs (AfterReceive hook, redirect, CORS, body stream)
//!     → Send to client
//! ```

pub mod client;
pub mod context;
pub mod forward;
pub mod hooks;
pub mod request;
pub mod response;
pub mod server;

pub use context::RequestContext;
pub use forward::Outcome;
pub use hooks::{AfterReceive, BeforeSend, HookVerdict};
pub use request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
pub use server::GisProxy;
