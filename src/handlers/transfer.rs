//! CSV export and import handlers.

use crate::error::AppError;
use crate::handlers::entity::entity_for;
use crate::query::{ListOptions, ListQuery};
use crate::response::{csv_attachment, success_one_ok};
use crate::service::CrudService;
use crate::transfer::{export_csv, import_csv, suggest_mapping, ImportRequest, PgRecordWriter};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

/// Every row matching the list query as a CSV attachment.
pub async fn export(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.resolved().await?;
    let entity = entity_for(&settings, &model)?;
    let opts = ListOptions::try_from(query)?;
    let rows = CrudService::list_all(&state.pool, &settings, entity, &opts).await?;
    let body = export_csv(entity, &rows)?;
    tracing::info!(model = %entity.name, rows = rows.len(), "csv export");
    Ok(csv_attachment(&entity.name, body))
}

pub async fn import(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Json(body): Json<ImportRequest>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.resolved().await?;
    let entity = entity_for(&settings, &model)?;
    let writer = PgRecordWriter::new(state.pool.clone());
    let report = import_csv(
        &writer,
        &settings,
        entity,
        &body.csv,
        &body.mapping,
        state.options.import_batch_size,
    )
    .await?;
    Ok(success_one_ok(report))
}

#[derive(Debug, Deserialize)]
pub struct MappingRequest {
    pub headers: Vec<String>,
}

pub async fn import_mapping(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Json(body): Json<MappingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.resolved().await?;
    let entity = entity_for(&settings, &model)?;
    Ok(success_one_ok(suggest_mapping(entity, &body.headers)))
}
