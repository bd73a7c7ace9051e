//! Utility functions for code generation and URL processing.
//!
//! - [`code_generator`] - Short code generation and syntactic validation
//! - [`url_normalizer`] - Scheme defaulting and URL validation

pub mod code_generator;
pub mod url_normalizer;
