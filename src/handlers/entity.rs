//! Model CRUD handlers: list, create, read, update, delete, bulk delete.

use crate::error::AppError;
use crate::query::{ListOptions, ListQuery};
use crate::response::{success_one, success_one_ok, success_page};
use crate::service::CrudService;
use crate::settings::{ResolvedEntity, ResolvedSettings, ScalarType};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Typed id from a path segment, following the id column's type.
pub(crate) fn parse_id(entity: &ResolvedEntity, id_str: &str) -> Result<Value, AppError> {
    let col = entity.id_column();
    let is_uuid = col.pg_type.eq_ignore_ascii_case("uuid");
    Ok(match &col.scalar {
        _ if is_uuid => {
            let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
            Value::String(u.to_string())
        }
        ScalarType::Int | ScalarType::BigInt => {
            let n: i64 = id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
            Value::Number(n.into())
        }
        _ => Value::String(id_str.to_string()),
    })
}

pub(crate) fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

pub(crate) fn entity_for<'a>(settings: &'a ResolvedSettings, model: &str) -> Result<&'a ResolvedEntity, AppError> {
    settings
        .entity(model)
        .ok_or_else(|| AppError::NotFound(format!("model {}", model)))
}

pub async fn list(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.resolved().await?;
    let entity = entity_for(&settings, &model)?;
    let opts = ListOptions::try_from(query)?;
    let page = CrudService::list(&state.pool, &settings, entity, &opts, state.options.per_page).await?;
    Ok(success_page(page.data, page.total, page.page, page.per_page))
}

pub async fn create(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.resolved().await?;
    let entity = entity_for(&settings, &model)?;
    let body = body_to_map(body)?;
    let row = CrudService::create(&state.pool, &settings, entity, &body).await?;
    Ok(success_one(row))
}

pub async fn read(
    State(state): State<AppState>,
    Path((model, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.resolved().await?;
    let entity = entity_for(&settings, &model)?;
    let id = parse_id(entity, &id_str)?;
    let row = CrudService::read(&state.pool, &settings, entity, &id).await?;
    Ok(success_one_ok(row))
}

pub async fn update(
    State(state): State<AppState>,
    Path((model, id_str)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.resolved().await?;
    let entity = entity_for(&settings, &model)?;
    let id = parse_id(entity, &id_str)?;
    let body = body_to_map(body)?;
    let row = CrudService::update(&state.pool, &settings, entity, &id, &body).await?;
    Ok(success_one_ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((model, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.resolved().await?;
    let entity = entity_for(&settings, &model)?;
    let id = parse_id(entity, &id_str)?;
    let deleted = CrudService::delete(&state.pool, entity, &id).await?;
    Ok(success_one_ok(deleted))
}

#[derive(Debug, Deserialize)]
pub struct DeleteManyBody {
    pub ids: Vec<Value>,
}

pub async fn delete_many(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Json(body): Json<DeleteManyBody>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.resolved().await?;
    let entity = entity_for(&settings, &model)?;
    let ids = body
        .ids
        .iter()
        .map(|v| match v {
            Value::String(s) => parse_id(entity, s),
            Value::Number(_) => parse_id(entity, &v.to_string()),
            _ => Err(AppError::BadRequest("ids must be strings or numbers".into())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let count = CrudService::delete_many(&state.pool, entity, &ids).await?;
    Ok(success_one_ok(serde_json::json!({ "count": count })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::blog;
    use serde_json::json;

    #[test]
    fn ids_follow_the_id_column() {
        let s = blog();
        assert_eq!(parse_id(s.entity("User").unwrap(), "12").unwrap(), json!(12));
        assert!(matches!(
            parse_id(s.entity("User").unwrap(), "abc"),
            Err(AppError::BadRequest(_))
        ));
        let archive = s.entity("Archive").unwrap();
        assert!(parse_id(archive, "not-a-uuid").is_err());
        assert_eq!(
            parse_id(archive, "6F9619FF-8B86-D011-B42D-00C04FC964FF").unwrap(),
            json!("6f9619ff-8b86-d011-b42d-00c04fc964ff")
        );
    }

    #[test]
    fn body_must_be_an_object() {
        assert!(body_to_map(json!([1])).is_err());
        assert_eq!(body_to_map(json!({ "a": 1 })).unwrap().len(), 1);
    }
}
