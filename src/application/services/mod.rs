//! Request-path services.

pub mod mapping_service;
pub mod reconcile_service;
pub mod redirect_service;

pub use mapping_service::{CodePolicy, MappingService};
pub use reconcile_service::{ReconcileReport, ReconcileService};
pub use redirect_service::{ClickMetadata, RedirectService, Resolution};
