//! CSV import: header mapping, per-cell conversion, batched inserts with per-row error reporting.

use crate::case::normalize_key;
use crate::error::AppError;
use crate::service::{
    convert_cell, ensure_allowed, insert_record, writable_column, Action, PreparedRecord, RequestValidator,
};
use crate::settings::{ColumnInfo, FieldOperation, ResolvedEntity, ResolvedSettings};
use async_trait::async_trait;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::collections::HashMap;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const MAX_IMPORT_ERRORS: usize = 100;

/// Destination of imported rows.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// Insert one prepared row; returns its id.
    async fn insert_record(
        &self,
        settings: &ResolvedSettings,
        entity: &ResolvedEntity,
        record: &PreparedRecord,
    ) -> Result<Value, AppError>;
}

/// Writes each row in its own transaction.
#[derive(Clone)]
pub struct PgRecordWriter {
    pool: PgPool,
}

impl PgRecordWriter {
    pub fn new(pool: PgPool) -> Self {
        PgRecordWriter { pool }
    }
}

#[async_trait]
impl RecordWriter for PgRecordWriter {
    async fn insert_record(
        &self,
        settings: &ResolvedSettings,
        entity: &ResolvedEntity,
        record: &PreparedRecord,
    ) -> Result<Value, AppError> {
        let mut tx = self.pool.begin().await?;
        let id = insert_record(&mut tx, settings, entity, record).await?;
        tx.commit().await?;
        Ok(id)
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub csv: String,
    /// CSV header -> field name. Unmapped headers are ignored.
    #[serde(default)]
    pub mapping: HashMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub success: usize,
    pub failed: usize,
    /// `Row N: message`, N counting data rows from 1. At most [`MAX_IMPORT_ERRORS`] entries.
    pub errors: Vec<String>,
}

/// Failed rows keyed by row number, turned into the capped error list once every batch is done.
#[derive(Default)]
struct Failures(Vec<(usize, String)>);

impl Failures {
    fn add(&mut self, row: usize, err: impl std::fmt::Display) {
        self.0.push((row, err.to_string()));
    }

    fn into_report(mut self, success: usize) -> ImportReport {
        self.0.sort_by_key(|(row, _)| *row);
        let failed = self.0.len();
        let errors = self
            .0
            .into_iter()
            .take(MAX_IMPORT_ERRORS)
            .map(|(row, msg)| format!("Row {}: {}", row, msg))
            .collect();
        ImportReport {
            success,
            failed,
            errors,
        }
    }
}

/// Resolve the mapping to (csv column index, target column) pairs.
fn mapped_columns<'a>(
    entity: &'a ResolvedEntity,
    headers: &csv::StringRecord,
    mapping: &HashMap<String, String>,
) -> Vec<(usize, &'a ColumnInfo)> {
    let mut out = Vec::new();
    for (i, header) in headers.iter().enumerate() {
        let Some(field) = mapping.get(header).filter(|f| !f.is_empty()) else {
            continue;
        };
        if entity.relation(field).is_some() {
            tracing::warn!(model = %entity.name, header, field = %field, "relation fields cannot be imported; ignored");
            continue;
        }
        match entity.column(field) {
            Some(col) if writable_column(entity, col, FieldOperation::Create) => out.push((i, col)),
            Some(_) => {
                tracing::warn!(model = %entity.name, header, field = %field, "field is not writable on create; ignored")
            }
            None => tracing::warn!(model = %entity.name, header, field = %field, "unknown mapping target; ignored"),
        }
    }
    out
}

fn convert_row(
    settings: &ResolvedSettings,
    entity: &ResolvedEntity,
    columns: &[(usize, &ColumnInfo)],
    row: &csv::StringRecord,
) -> Result<PreparedRecord, AppError> {
    let mut values = Map::new();
    for (i, col) in columns {
        let cell = row.get(*i).unwrap_or("");
        values.insert(col.field.clone(), convert_cell(col, cell, &settings.enums)?);
    }
    let record = PreparedRecord {
        columns: values,
        relations: Vec::new(),
    };
    RequestValidator::check(entity, &record, FieldOperation::Create)?;
    Ok(record)
}

/// Import `csv_text` into `entity`. Rows failing conversion or validation are reported and skipped;
/// valid rows are written in batches of `batch_size`, one batch at a time. Earlier batches stay
/// written when a later one fails.
pub async fn import_csv<W: RecordWriter + ?Sized>(
    writer: &W,
    settings: &ResolvedSettings,
    entity: &ResolvedEntity,
    csv_text: &str,
    mapping: &HashMap<String, String>,
    batch_size: usize,
) -> Result<ImportReport, AppError> {
    ensure_allowed(entity, Action::Create)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(csv_text.as_bytes());
    let headers = reader.headers()?.clone();
    let columns = mapped_columns(entity, &headers, mapping);

    let mut failures = Failures::default();
    let mut success = 0;
    let mut valid: Vec<(usize, PreparedRecord)> = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let row_num = i + 1;
        let converted = result
            .map_err(AppError::from)
            .and_then(|row| convert_row(settings, entity, &columns, &row));
        match converted {
            Ok(record) => valid.push((row_num, record)),
            Err(e) => failures.add(row_num, e),
        }
    }

    for batch in valid.chunks(batch_size.max(1)) {
        let results = futures::future::join_all(
            batch
                .iter()
                .map(|(_, record)| writer.insert_record(settings, entity, record)),
        )
        .await;
        for ((row_num, _), result) in batch.iter().zip(results) {
            match result {
                Ok(_) => success += 1,
                Err(e) => failures.add(*row_num, e),
            }
        }
    }

    let report = failures.into_report(success);
    tracing::info!(
        model = %entity.name,
        success = report.success,
        failed = report.failed,
        "csv import finished"
    );
    Ok(report)
}

/// Suggested header -> field mapping: a header matches a writable scalar or enum field whose name
/// or title is equal ignoring case, spaces, underscores and dashes. Relation fields are never suggested.
pub fn suggest_mapping(entity: &ResolvedEntity, headers: &[String]) -> HashMap<String, String> {
    let candidates: Vec<&ColumnInfo> = entity
        .columns
        .iter()
        .filter(|c| writable_column(entity, c, FieldOperation::Create))
        .collect();
    let mut out = HashMap::new();
    for header in headers {
        let key = normalize_key(header);
        if key.is_empty() {
            continue;
        }
        let by_name = candidates.iter().find(|c| normalize_key(&c.field) == key);
        let found = by_name.or_else(|| candidates.iter().find(|c| normalize_key(&c.title) == key));
        if let Some(col) = found {
            out.insert(header.clone(), col.field.clone());
        }
    }
    out
}
