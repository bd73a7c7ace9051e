//! HTTP middleware and extractors.
//!
//! - [`identity`] - Caller identity forwarded by the authenticating gateway
//! - [`tracing`] - Request/response tracing

pub mod identity;
pub mod tracing;
