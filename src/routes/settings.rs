//! Settings document routes.

use crate::handlers::settings::{get_relation, get_settings, put_settings, regenerate_settings};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

pub fn settings_routes(state: AppState) -> Router {
    Router::new()
        .route("/settings", get(get_settings).put(put_settings))
        .route("/settings/regenerate", post(regenerate_settings))
        .route("/settings/:model/:field/relation", get(get_relation))
        .with_state(state)
}
