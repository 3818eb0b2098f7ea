//! Routers: common probes, settings document, model CRUD and CSV transfer.

pub mod common;
pub mod entity;
pub mod settings;

pub use common::{common_routes, common_routes_with_ready};
pub use entity::entity_routes;
pub use settings::settings_routes;

use crate::state::AppState;
use axum::Router;

/// Full admin API: probes at the root, settings under `/api/v1`, models under `/api/v1/models`.
pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .nest("/api/v1", settings_routes(state.clone()))
        .nest("/api/v1/models", entity_routes(state))
}
