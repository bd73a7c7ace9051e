//! HTTP request handlers for the writer and the redirector.

pub mod health;
pub mod mappings;
pub mod redirect;
pub mod stats;

pub use health::{redirector_health_handler, writer_health_handler};
pub use mappings::{create_mapping_handler, delete_mapping_handler, list_mine_handler};
pub use redirect::redirect_handler;
pub use stats::stats_handler;
