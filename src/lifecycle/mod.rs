//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Build GisProxy → Apply setters → start()
//!
//! Shutdown (shutdown.rs):
//!     stop(timeout) → Stop accepting → Drain connections → Force close
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Listener starts last (traffic only when ready)
//! - Shutdown has timeout: forced close after deadline
//! - Start/bind failure is the only fatal error

pub mod shutdown;
pub mod signals;

pub use shutdown::ShutdownHandle;
