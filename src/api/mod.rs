//! REST API layer for HTTP request/response handling.
//!
//! Translates HTTP requests into application service calls and maps typed
//! outcomes onto status codes.
//!
//! # Modules
//!
//! - [`dto`] - Data Transfer Objects for request/response serialization
//! - [`handlers`] - HTTP request handlers
//! - [`middleware`] - Identity extraction and request tracing
//! - [`routes`] - Writer route configuration

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
