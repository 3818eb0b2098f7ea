//! Generic CRUD execution against PostgreSQL.

use crate::error::AppError;
use crate::query::{build_where, FilterValue, ListOptions};
use crate::service::validation::{ensure_allowed, Action, PreparedRecord, RelationWrite, RequestValidator};
use crate::settings::{ColumnInfo, FieldOperation, RelationLink, ResolvedEntity, ResolvedSettings};
use crate::sql::{
    connect_backward, count, delete, delete_join_rows, delete_many, insert, insert_join_rows, select_by_id,
    select_rows, target_of, update, QueryBuf, SelectSpec,
};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, PgPool};

/// One page of a list request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub data: Vec<Value>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

pub struct CrudService;

impl CrudService {
    /// Filtered, searched, sorted page of rows with relation previews.
    pub async fn list(
        pool: &PgPool,
        settings: &ResolvedSettings,
        entity: &ResolvedEntity,
        opts: &ListOptions,
        default_per_page: u32,
    ) -> Result<Page, AppError> {
        let order_by = sort_column(entity, opts.order_by.as_deref())?;
        check_filters(entity, &opts.filters)?;
        let filter = build_where(&opts.filters, opts.search.as_deref(), &entity.search_fields);
        let per_page = opts.per_page(default_per_page);

        let rows_q = select_rows(
            settings,
            entity,
            &SelectSpec {
                filter: filter.as_ref(),
                order_by,
                order: opts.order,
                limit: Some(per_page),
                offset: opts.offset(default_per_page),
                previews: true,
            },
        )?;
        let count_q = count(settings, entity, filter.as_ref())?;
        let (data, total) = futures::try_join!(fetch_all(pool, &rows_q), fetch_count(pool, &count_q))?;
        Ok(Page {
            data,
            total,
            page: opts.page(),
            per_page,
        })
    }

    /// Every row matching the list options (no paging, no previews). Used by CSV export.
    pub async fn list_all(
        pool: &PgPool,
        settings: &ResolvedSettings,
        entity: &ResolvedEntity,
        opts: &ListOptions,
    ) -> Result<Vec<Value>, AppError> {
        let order_by = sort_column(entity, opts.order_by.as_deref())?;
        check_filters(entity, &opts.filters)?;
        let filter = build_where(&opts.filters, opts.search.as_deref(), &entity.search_fields);
        let q = select_rows(
            settings,
            entity,
            &SelectSpec {
                filter: filter.as_ref(),
                order_by,
                order: opts.order,
                limit: None,
                offset: 0,
                previews: false,
            },
        )?;
        fetch_all(pool, &q).await
    }

    pub async fn read(
        pool: &PgPool,
        settings: &ResolvedSettings,
        entity: &ResolvedEntity,
        id: &Value,
    ) -> Result<Value, AppError> {
        let q = select_by_id(settings, entity, id)?;
        fetch_optional(pool, &q).await?.ok_or_else(|| not_found(entity, id))
    }

    /// Insert one row plus its relation writes in a transaction. Returns the created row.
    pub async fn create(
        pool: &PgPool,
        settings: &ResolvedSettings,
        entity: &ResolvedEntity,
        payload: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        ensure_allowed(entity, Action::Create)?;
        let record = RequestValidator::prepare(settings, entity, payload, FieldOperation::Create)?;
        let mut tx = pool.begin().await?;
        let id = insert_record(&mut tx, settings, entity, &record).await?;
        tx.commit().await?;
        Self::read(pool, settings, entity, &id).await
    }

    /// Update one row by id. Returns the updated row.
    pub async fn update(
        pool: &PgPool,
        settings: &ResolvedSettings,
        entity: &ResolvedEntity,
        id: &Value,
        payload: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        ensure_allowed(entity, Action::Update)?;
        let record = RequestValidator::prepare(settings, entity, payload, FieldOperation::Update)?;
        let mut tx = pool.begin().await?;
        let found = match update(entity, id, &record.columns) {
            Some(q) => fetch_optional(&mut *tx, &q).await?,
            None => fetch_optional(&mut *tx, &select_by_id(settings, entity, id)?).await?,
        };
        if found.is_none() {
            return Err(not_found(entity, id));
        }
        write_relations(&mut tx, settings, entity, id, &record.relations).await?;
        tx.commit().await?;
        Self::read(pool, settings, entity, id).await
    }

    /// Delete one row by id. Returns `{id}` of the deleted row.
    pub async fn delete(pool: &PgPool, entity: &ResolvedEntity, id: &Value) -> Result<Value, AppError> {
        ensure_allowed(entity, Action::Delete)?;
        let q = delete(entity, id);
        fetch_optional(pool, &q).await?.ok_or_else(|| not_found(entity, id))?;
        tracing::info!(model = %entity.name, id = %id, "record deleted");
        let mut out = Map::new();
        out.insert(entity.id_field.clone(), id.clone());
        Ok(Value::Object(out))
    }

    /// Delete rows by id. Returns how many were deleted.
    pub async fn delete_many(pool: &PgPool, entity: &ResolvedEntity, ids: &[Value]) -> Result<u64, AppError> {
        ensure_allowed(entity, Action::Delete)?;
        if ids.is_empty() {
            return Ok(0);
        }
        let q = delete_many(entity, ids);
        let deleted = fetch_all(pool, &q).await?.len() as u64;
        tracing::info!(model = %entity.name, requested = ids.len(), deleted, "records deleted");
        Ok(deleted)
    }
}

/// Insert a prepared record and apply its relation writes; returns the new id (as text).
pub(crate) async fn insert_record(
    conn: &mut PgConnection,
    settings: &ResolvedSettings,
    entity: &ResolvedEntity,
    record: &PreparedRecord,
) -> Result<Value, AppError> {
    let q = insert(entity, &record.columns);
    let row = fetch_optional(&mut *conn, &q)
        .await?
        .ok_or_else(|| AppError::Db(sqlx::Error::RowNotFound))?;
    let id = row.get(&entity.id_field).cloned().unwrap_or(Value::Null);
    write_relations(conn, settings, entity, &id, &record.relations).await?;
    Ok(id)
}

async fn write_relations(
    conn: &mut PgConnection,
    settings: &ResolvedSettings,
    entity: &ResolvedEntity,
    id: &Value,
    writes: &[RelationWrite],
) -> Result<(), AppError> {
    for w in writes {
        let (field, ids) = match w {
            RelationWrite::ReplaceJoin { field, ids } | RelationWrite::Connect { field, ids } => (field, ids),
        };
        let rel = entity
            .relation(field)
            .ok_or_else(|| AppError::Internal(format!("unknown relation '{}'", field)))?;
        let target = target_of(settings, rel)?;
        match (&rel.link, w) {
            (
                RelationLink::JoinTable {
                    table,
                    our_column,
                    their_column,
                },
                RelationWrite::ReplaceJoin { .. },
            ) => {
                execute(&mut *conn, &delete_join_rows(entity, table, our_column, id)).await?;
                if !ids.is_empty() {
                    let q = insert_join_rows(entity, target, (table, our_column, their_column), id, ids);
                    execute(&mut *conn, &q).await?;
                }
            }
            (RelationLink::Backward { pairs }, RelationWrite::Connect { .. }) => {
                if !ids.is_empty() {
                    execute(&mut *conn, &connect_backward(entity, target, pairs, id, ids)).await?;
                }
            }
            _ => {
                return Err(AppError::Internal(format!("relation '{}' write does not match its link", field)));
            }
        }
    }
    Ok(())
}

fn not_found(entity: &ResolvedEntity, id: &Value) -> AppError {
    AppError::NotFound(format!("{} {}", entity.title, id))
}

fn sort_column<'a>(entity: &'a ResolvedEntity, order_by: Option<&str>) -> Result<&'a ColumnInfo, AppError> {
    let Some(name) = order_by else {
        return Ok(entity.id_column());
    };
    entity
        .column(name)
        .filter(|c| c.visibility.sort && !c.is_list)
        .ok_or_else(|| AppError::BadRequest(format!("cannot sort {} by '{}'", entity.name, name)))
}

/// Inactive filters (empty value, not a null check) are ignored, as `build_where` drops them.
fn check_filters(entity: &ResolvedEntity, filters: &[FilterValue]) -> Result<(), AppError> {
    for f in filters.iter().filter(|f| !f.has_empty_value() || f.operator.is_null_check()) {
        let filterable = match (entity.column(&f.field), entity.relation(&f.field)) {
            (Some(c), _) => c.visibility.filter,
            (None, Some(r)) => r.visibility.filter,
            (None, None) => false,
        };
        if !filterable {
            return Err(AppError::BadRequest(format!("cannot filter {} by '{}'", entity.name, f.field)));
        }
    }
    Ok(())
}

fn build_query(q: &QueryBuf) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

async fn fetch_all<'e, E: PgExecutor<'e>>(executor: E, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
    let rows = build_query(q).fetch_all(executor).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

async fn fetch_optional<'e, E: PgExecutor<'e>>(executor: E, q: &QueryBuf) -> Result<Option<Value>, AppError> {
    let row = build_query(q).fetch_optional(executor).await?;
    Ok(row.map(|r| row_to_json(&r)))
}

async fn fetch_count<'e, E: PgExecutor<'e>>(executor: E, q: &QueryBuf) -> Result<u64, AppError> {
    use sqlx::Row;
    let row = build_query(q).fetch_one(executor).await?;
    let n: i64 = row.try_get("count")?;
    Ok(n.max(0) as u64)
}

async fn execute<'e, E: PgExecutor<'e>>(executor: E, q: &QueryBuf) -> Result<u64, AppError> {
    let done = build_query(q).execute(executor).await?;
    Ok(done.rows_affected())
}

pub(crate) fn row_to_json(row: &PgRow) -> Value {
    use sqlx::{Column, Row};
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(f64::from(n)) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(t)) = row.try_get::<Option<chrono::NaiveTime>, _>(name) {
        return Value::String(t.format("%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FilterOperator;
    use crate::test_support::blog;
    use serde_json::json;

    #[test]
    fn sort_column_must_be_sortable() {
        let s = blog();
        let post = s.entity("Post").unwrap();
        assert_eq!(sort_column(post, None).unwrap().field, "id");
        assert_eq!(sort_column(post, Some("title")).unwrap().field, "title");
        assert!(matches!(sort_column(post, Some("author")), Err(AppError::BadRequest(_))));
        assert!(sort_column(post, Some("nope")).is_err());
    }

    #[test]
    fn filters_must_name_filterable_fields() {
        let s = blog();
        let post = s.entity("Post").unwrap();
        let ok = [
            FilterValue::new("title", FilterOperator::Contains, json!("a")),
            FilterValue::new("author", FilterOperator::Is, json!({ "id": 1 })),
        ];
        assert!(check_filters(post, &ok).is_ok());
        let bad = [FilterValue::new("missing", FilterOperator::Equals, json!(1))];
        assert!(matches!(check_filters(post, &bad), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn inactive_filters_are_not_checked() {
        let s = blog();
        let post = s.entity("Post").unwrap();
        let inactive = [
            FilterValue::new("missing", FilterOperator::Equals, json!("")),
            FilterValue::new("secret", FilterOperator::In, json!([])),
            FilterValue::new("nope", FilterOperator::Contains, Value::Null),
        ];
        assert!(check_filters(post, &inactive).is_ok());
        let null_check = [FilterValue::new("missing", FilterOperator::IsNull, Value::Null)];
        assert!(matches!(check_filters(post, &null_check), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn writes_check_permissions_before_the_database() {
        // never connects: the permission check fails first
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();
        let s = blog();
        let archive = s.entity("Archive").unwrap();
        let payload = Map::new();
        assert!(matches!(
            CrudService::create(&pool, &s, archive, &payload).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            CrudService::update(&pool, &s, archive, &json!("x"), &payload).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            CrudService::delete(&pool, archive, &json!("x")).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            CrudService::delete_many(&pool, archive, &[json!("x")]).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
