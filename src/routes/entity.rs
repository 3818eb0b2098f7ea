//! Model routes. Handlers resolve the model from the first path segment on every request.
//!
//! `delete`, `export` and `import` are reserved in the id position: their static routes win for
//! every method, so `GET /:model/delete` is 405 rather than a read.

use crate::handlers::entity::{create, delete as delete_handler, delete_many, list, read, update};
use crate::handlers::transfer::{export, import, import_mapping};
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, routing::get, routing::post, Router};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

pub fn entity_routes(state: AppState) -> Router {
    let import_limit = ServiceBuilder::new()
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.options.import_max_bytes));
    Router::new()
        .route("/:model", get(list).post(create))
        .route("/:model/delete", post(delete_many))
        .route("/:model/export", get(export))
        .route("/:model/import", post(import).layer(import_limit))
        .route("/:model/import/mapping", post(import_mapping))
        .route("/:model/:id", get(read).patch(update).delete(delete_handler))
        .with_state(state)
}
