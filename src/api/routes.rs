//! Writer API route configuration.

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::api::handlers::{
    create_mapping_handler, delete_mapping_handler, list_mine_handler, stats_handler,
};
use crate::state::WriterState;

/// Mapping management routes.
///
/// # Endpoints
///
/// - `POST   /urls`            - Create a mapping (anonymous or owned)
/// - `GET    /urls/mine`       - List the caller's mappings
/// - `DELETE /urls/{shortId}`  - Delete an owned mapping
/// - `GET    /stats/{shortId}` - Click counter of a mapping
pub fn mapping_routes() -> Router<WriterState> {
    Router::new()
        .route("/urls", post(create_mapping_handler))
        .route("/urls/mine", get(list_mine_handler))
        .route("/urls/{short_id}", delete(delete_mapping_handler))
        .route("/stats/{short_id}", get(stats_handler))
}
