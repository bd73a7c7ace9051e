//! Shared state injected into HTTP handlers.

use std::sync::Arc;

use crate::application::services::{MappingService, RedirectService};

/// State of the writer service.
#[derive(Clone)]
pub struct WriterState {
    pub mapping_service: Arc<MappingService>,
}

impl WriterState {
    pub fn new(mapping_service: Arc<MappingService>) -> Self {
        Self { mapping_service }
    }
}

/// State of the redirector service.
#[derive(Clone)]
pub struct RedirectorState {
    pub redirect_service: Arc<RedirectService>,
    /// Where cache misses are sent; `None` answers 404.
    pub not_found_redirect: Option<String>,
}

impl RedirectorState {
    pub fn new(redirect_service: Arc<RedirectService>, not_found_redirect: Option<String>) -> Self {
        Self {
            redirect_service,
            not_found_redirect,
        }
    }
}
