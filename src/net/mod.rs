//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → axum-server acceptor (plain or rustls)
//!     → tls.rs (certificate loading, before start)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS is optional and handled transparently
//! - Missing certificate files fail start, not the first handshake

pub mod tls;
