//! Data Transfer Objects for API requests and responses.
//!
//! Request and response bodies use camelCase keys, matching the queue payloads.

pub mod health;
pub mod mapping;
pub mod stats;
