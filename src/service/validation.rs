//! Permission checks and request validation from settings rules.

use crate::error::AppError;
use crate::service::convert::convert_value;
use crate::settings::{
    ColumnInfo, FieldOperation, RelationEditMode, RelationInfo, RelationLink, ResolvedEntity, ResolvedSettings,
    ValidationRule,
};
use regex::Regex;
use serde_json::{Map, Value};

/// Write actions gated by the model's permission flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

pub fn ensure_allowed(entity: &ResolvedEntity, action: Action) -> Result<(), AppError> {
    let allowed = match action {
        Action::Create => entity.can_create,
        Action::Update => entity.can_update,
        Action::Delete => entity.can_delete,
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("cannot {} {} records", action.verb(), entity.title)))
    }
}

/// Relation change applied after the row itself is written.
#[derive(Clone, Debug, PartialEq)]
pub enum RelationWrite {
    /// Replace all join-table rows of the relation.
    ReplaceJoin { field: String, ids: Vec<Value> },
    /// Point the related rows' foreign key at this row.
    Connect { field: String, ids: Vec<Value> },
}

/// Payload split into column values (keyed by field name) and relation writes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreparedRecord {
    pub columns: Map<String, Value>,
    pub relations: Vec<RelationWrite>,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Convert and validate a create/update payload. Fields hidden for the operation, read-only
    /// fields, `isUpdatedAt` fields and (on update) the id are dropped.
    pub fn prepare(
        settings: &ResolvedSettings,
        entity: &ResolvedEntity,
        payload: &Map<String, Value>,
        op: FieldOperation,
    ) -> Result<PreparedRecord, AppError> {
        let mut record = PreparedRecord::default();
        for (key, v) in payload {
            if let Some(col) = entity.column(key) {
                if !writable_column(entity, col, op) {
                    continue;
                }
                let converted = convert_value(col, v, &settings.enums)?;
                record.columns.insert(col.field.clone(), converted);
            } else if let Some(rel) = entity.relation(key) {
                if !rel.visibility.allows(op) || rel.presentation.edit_mode == RelationEditMode::Readonly {
                    continue;
                }
                relation_value(settings, entity, rel, v, &mut record)?;
            } else {
                tracing::debug!(model = %entity.name, field = %key, "ignoring unknown payload field");
            }
        }
        Self::check(entity, &record, op)?;
        Ok(record)
    }

    /// Required-field and rule checks on already converted values.
    pub fn check(entity: &ResolvedEntity, record: &PreparedRecord, op: FieldOperation) -> Result<(), AppError> {
        match op {
            FieldOperation::Create => check_required_create(entity, record)?,
            _ => check_required_present(entity, record)?,
        }
        for (field, v) in &record.columns {
            if let Some(col) = entity.column(field) {
                if let Some(rule) = &col.validation {
                    validate_field(col, v, rule)?;
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn writable_column(entity: &ResolvedEntity, col: &ColumnInfo, op: FieldOperation) -> bool {
    if !col.visibility.allows(op) || col.read_only || col.is_updated_at {
        return false;
    }
    !(op == FieldOperation::Update && col.field == entity.id_field)
}

/// Id of a related row given as a scalar or as `{id}`.
fn related_id(target: &ResolvedEntity, v: &Value) -> Option<Value> {
    match v {
        Value::Object(m) => m.get(&target.id_field).filter(|id| !id.is_null()).cloned(),
        Value::Null => None,
        other => Some(other.clone()),
    }
}

fn related_ids(
    settings: &ResolvedSettings,
    target: &ResolvedEntity,
    rel: &RelationInfo,
    v: &Value,
) -> Result<Vec<Value>, AppError> {
    let items: &[Value] = match v {
        Value::Array(items) => items,
        Value::Null => &[],
        _ => {
            return Err(AppError::invalid_value(
                &rel.field,
                format!("{} expects a list of ids", rel.title),
            ))
        }
    };
    items
        .iter()
        .filter_map(|item| related_id(target, item))
        .map(|id| convert_value(target.id_column(), &id, &settings.enums))
        .collect()
}

fn relation_value(
    settings: &ResolvedSettings,
    entity: &ResolvedEntity,
    rel: &RelationInfo,
    v: &Value,
    record: &mut PreparedRecord,
) -> Result<(), AppError> {
    let target = settings
        .entity(&rel.target)
        .ok_or_else(|| AppError::Internal(format!("relation target '{}' not resolved", rel.target)))?;
    match (&rel.link, rel.is_multi()) {
        (RelationLink::Forward { pairs }, false) => {
            let id = related_id(target, v);
            for ((_, their_col), from_field) in pairs.iter().zip(&rel.from_fields) {
                let Some(col) = entity.column(from_field) else { continue };
                let value = match (&id, v) {
                    (None, _) => Value::Null,
                    // composite keys are given as an object of the referenced fields
                    (Some(_), Value::Object(m)) if pairs.len() > 1 => target
                        .columns
                        .iter()
                        .find(|c| &c.column == their_col)
                        .and_then(|c| m.get(&c.field))
                        .cloned()
                        .unwrap_or(Value::Null),
                    (Some(id), _) => id.clone(),
                };
                let converted = convert_value(col, &value, &settings.enums)?;
                record.columns.insert(col.field.clone(), converted);
            }
        }
        (RelationLink::JoinTable { .. }, _) => {
            record.relations.push(RelationWrite::ReplaceJoin {
                field: rel.field.clone(),
                ids: related_ids(settings, target, rel, v)?,
            });
        }
        (RelationLink::Backward { .. }, true) => {
            record.relations.push(RelationWrite::Connect {
                field: rel.field.clone(),
                ids: related_ids(settings, target, rel, v)?,
            });
        }
        (RelationLink::Backward { .. }, false) => {
            let ids = related_id(target, v)
                .map(|id| convert_value(target.id_column(), &id, &settings.enums))
                .transpose()?
                .into_iter()
                .collect();
            record.relations.push(RelationWrite::Connect {
                field: rel.field.clone(),
                ids,
            });
        }
        (RelationLink::Forward { .. }, true) => {
            return Err(AppError::BadRequest(format!(
                "relation '{}' cannot be written from this side",
                rel.field
            )));
        }
    }
    Ok(())
}

fn is_blank(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn check_required_create(entity: &ResolvedEntity, record: &PreparedRecord) -> Result<(), AppError> {
    let mut reported_fk: Vec<&str> = Vec::new();
    for rel in entity.relations.iter().filter(|r| r.required && !r.from_fields.is_empty()) {
        if rel.from_fields.iter().any(|f| is_blank(record.columns.get(f))) {
            let has_default = rel
                .from_fields
                .iter()
                .all(|f| entity.column(f).map(|c| c.has_default).unwrap_or(false));
            if !has_default {
                return Err(AppError::RequiredField {
                    field: rel.field.clone(),
                    title: rel.title.clone(),
                });
            }
        }
        reported_fk.extend(rel.from_fields.iter().map(String::as_str));
    }
    for col in &entity.columns {
        if !col.required || col.has_default || reported_fk.contains(&col.field.as_str()) {
            continue;
        }
        if is_blank(record.columns.get(&col.field)) {
            return Err(AppError::RequiredField {
                field: col.field.clone(),
                title: col.title.clone(),
            });
        }
    }
    Ok(())
}

/// On update only the fields sent are checked: a required field may not be cleared.
fn check_required_present(entity: &ResolvedEntity, record: &PreparedRecord) -> Result<(), AppError> {
    for (field, v) in &record.columns {
        let Some(col) = entity.column(field) else { continue };
        if col.required && is_blank(Some(v)) {
            let rel = entity.relations.iter().find(|r| r.from_fields.contains(field));
            return Err(match rel {
                Some(rel) if rel.required => AppError::RequiredField {
                    field: rel.field.clone(),
                    title: rel.title.clone(),
                },
                _ => AppError::RequiredField {
                    field: col.field.clone(),
                    title: col.title.clone(),
                },
            });
        }
    }
    Ok(())
}

/// Check a converted value against the column's rules. Null passes.
pub fn validate_field(col: &ColumnInfo, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    let title = &col.title;
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(AppError::invalid_value(
                    &col.field,
                    format!("{} must be at most {} characters", title, max),
                ));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(AppError::invalid_value(
                    &col.field,
                    format!("{} must be at least {} characters", title, min),
                ));
            }
        }
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern)
                .map_err(|e| AppError::Internal(format!("invalid pattern for {}: {}", col.field, e)))?;
            if !re.is_match(s) {
                return Err(AppError::invalid_value(
                    &col.field,
                    format!("{} does not match required pattern", title),
                ));
            }
        }
    }
    let number = v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse::<f64>().ok()));
    if col.scalar.is_numeric() {
        if let (Some(min), Some(n)) = (rule.minimum, number) {
            if n < min {
                return Err(AppError::invalid_value(&col.field, format!("{} must be at least {}", title, min)));
            }
        }
        if let (Some(max), Some(n)) = (rule.maximum, number) {
            if n > max {
                return Err(AppError::invalid_value(&col.field, format!("{} must be at most {}", title, max)));
            }
        }
    }
    Ok(())
}

fn validate_format(col: &ColumnInfo, v: &Value, format: &str) -> Result<(), AppError> {
    let Some(s) = v.as_str() else { return Ok(()) };
    let ok = match format.to_lowercase().as_str() {
        "email" => s.len() >= 3 && s.contains('@'),
        "uuid" => uuid::Uuid::parse_str(s).is_ok(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::invalid_value(
            &col.field,
            format!("{} must be a valid {}", col.title, format.to_lowercase()),
        ))
    }
}
