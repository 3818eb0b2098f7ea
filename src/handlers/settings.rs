//! Settings document handlers: read, replace, regenerate from the database, relation presentation.

use crate::error::AppError;
use crate::handlers::entity::entity_for;
use crate::response::success_one_ok;
use crate::settings::generate::{introspect, merge_settings};
use crate::settings::{
    resolve, AdminSettings, RelationAction, RelationCardinality, RelationDisplayMode, RelationEditMode,
    RelationPresentation,
};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

pub async fn get_settings(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let settings = state.settings.load().await?;
    Ok(success_one_ok(settings))
}

/// Replace the whole settings document. It must resolve before it is written.
pub async fn put_settings(
    State(state): State<AppState>,
    Json(body): Json<AdminSettings>,
) -> Result<impl IntoResponse, AppError> {
    resolve(&body, &state.options.schema).map_err(|e| AppError::Validation(e.to_string()))?;
    state.settings.save(&body).await?;
    Ok(success_one_ok(body))
}

/// Rebuild settings from the database catalog, keeping user choices for models and fields that still exist.
pub async fn regenerate_settings(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let generated = introspect(&state.pool, &state.options.schema).await?;
    let existing = match state.settings.load().await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "no readable settings file; regenerating from scratch");
            AdminSettings::default()
        }
    };
    let merged = merge_settings(&existing, &generated);
    state.settings.save(&merged).await?;
    tracing::info!(
        schema = %state.options.schema,
        models = merged.models.len(),
        enums = merged.enums.len(),
        "settings regenerated"
    );
    Ok(success_one_ok(merged))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDescription {
    pub model: String,
    pub field: String,
    pub target: String,
    pub cardinality: RelationCardinality,
    pub presentation: RelationPresentation,
    pub valid_display_modes: &'static [RelationDisplayMode],
    pub valid_edit_modes: &'static [RelationEditMode],
    pub valid_actions: &'static [RelationAction],
}

pub async fn get_relation(
    State(state): State<AppState>,
    Path((model, field)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.resolved().await?;
    let entity = entity_for(&settings, &model)?;
    let rel = entity
        .relation(&field)
        .ok_or_else(|| AppError::NotFound(format!("relation {}.{}", entity.name, field)))?;
    let cardinality = rel.cardinality();
    Ok(success_one_ok(RelationDescription {
        model: entity.name.clone(),
        field: rel.field.clone(),
        target: rel.target.clone(),
        cardinality,
        presentation: rel.presentation.clone(),
        valid_display_modes: cardinality.valid_display_modes(),
        valid_edit_modes: cardinality.valid_edit_modes(),
        valid_actions: cardinality.valid_actions(),
    }))
}
