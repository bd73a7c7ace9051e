//! Core domain entities.
//!
//! Entities are plain data structures. Creation input uses a separate
//! `New*` struct, following the same split as the persistence layer.
//!
//! - [`Mapping`] - the canonical short code to long URL record
//! - [`NewMapping`] - insert payload produced by the writer
//! - [`DeleteOutcome`] - tri-state result of an owner-authorized delete

pub mod mapping;

pub use mapping::{DeleteOutcome, Mapping, NewMapping};
