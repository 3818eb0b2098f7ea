//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a resolved entity.

use crate::error::AppError;
use crate::query::SortOrder;
use crate::settings::{ColumnInfo, RelationDisplayMode, RelationInfo, RelationLink, ResolvedEntity, ResolvedSettings, ScalarType};
use crate::sql::params::PgBindValue;
use crate::sql::predicate::compile_where;
use serde_json::{Map, Value};

/// Alias of the entity's own table in every SELECT.
pub const MAIN_ALIAS: &str = "main";

/// Maximum related rows embedded in a multi-valued relation preview.
pub const PREVIEW_LIMIT: u32 = 10;

/// Quote identifier for PostgreSQL (safe: only from settings).
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub(crate) fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

/// String literal for identifiers used as JSON keys.
fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub(crate) fn column_ref(alias: &str, col: &ColumnInfo) -> String {
    format!("{}.{}", alias, quoted(&col.column))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
    aliases: u32,
}

impl QueryBuf {
    pub fn new() -> Self {
        QueryBuf::default()
    }

    /// Bind `v` and return its placeholder with a cast, e.g. `$3::int4`.
    pub fn push_param(&mut self, v: &Value, pg_type: &str) -> String {
        self.params.push(PgBindValue::for_type(v, pg_type));
        format!("${}::{}", self.params.len(), pg_type)
    }

    /// Like [`push_param`](Self::push_param) but honours column encodings (bytes travel as base64).
    pub fn push_column_param(&mut self, v: &Value, col: &ColumnInfo) -> String {
        if col.scalar == ScalarType::Bytes && !col.is_list {
            let ph = self.push_param(v, "text");
            return format!("decode({}, 'base64')", ph);
        }
        self.push_param(v, &col.pg_type)
    }

    /// Fresh table alias for subqueries (`t0`, `t1`, ...).
    pub fn next_alias(&mut self) -> String {
        let a = format!("t{}", self.aliases);
        self.aliases += 1;
        a
    }
}

/// Output expression for a column; types sqlx cannot decode into JSON directly are converted in SQL.
fn select_expr(alias: &str, col: &ColumnInfo) -> String {
    let r = column_ref(alias, col);
    if col.is_list {
        return format!("to_jsonb({})", r);
    }
    match col.scalar {
        ScalarType::Decimal | ScalarType::Enum(_) => format!("{}::text", r),
        ScalarType::DateTime if col.is_time_of_day() => format!("{}::text", r),
        ScalarType::Bytes => format!("encode({}, 'base64')", r),
        _ => r,
    }
}

/// Target rows of a relation as seen from `alias`: FROM clause plus correlation condition.
pub(crate) struct RelationSource {
    pub alias: String,
    pub from: String,
    pub on: String,
}

pub(crate) fn relation_source(
    q: &mut QueryBuf,
    entity: &ResolvedEntity,
    target: &ResolvedEntity,
    rel: &RelationInfo,
    alias: &str,
) -> RelationSource {
    let t = q.next_alias();
    let table = qualified_table(&target.schema_name, &target.table_name);
    match &rel.link {
        RelationLink::Forward { pairs } | RelationLink::Backward { pairs } => {
            let on = pairs
                .iter()
                .map(|(ours, theirs)| format!("{}.{} = {}.{}", t, quoted(theirs), alias, quoted(ours)))
                .collect::<Vec<_>>()
                .join(" AND ");
            RelationSource {
                from: format!("{} {}", table, t),
                on,
                alias: t,
            }
        }
        RelationLink::JoinTable {
            table: join_table,
            our_column,
            their_column,
        } => {
            let j = q.next_alias();
            let from = format!(
                "{} {} JOIN {} {} ON {}.{} = {}",
                table,
                t,
                qualified_table(&entity.schema_name, join_table),
                j,
                j,
                quoted(their_column),
                column_ref(&t, target.id_column())
            );
            let on = format!("{}.{} = {}", j, quoted(our_column), column_ref(alias, entity.id_column()));
            RelationSource { alias: t, from, on }
        }
    }
}

pub(crate) fn target_of<'a>(settings: &'a ResolvedSettings, rel: &RelationInfo) -> Result<&'a ResolvedEntity, AppError> {
    settings
        .entity(&rel.target)
        .ok_or_else(|| AppError::Internal(format!("relation target '{}' not resolved", rel.target)))
}

/// `json_build_object` of the target's id and preview fields.
fn preview_object(target: &ResolvedEntity, rel: &RelationInfo, alias: &str) -> String {
    let mut fields = vec![target.id_field.as_str()];
    for f in &rel.preview_fields {
        if !fields.contains(&f.as_str()) {
            fields.push(f);
        }
    }
    let pairs: Vec<String> = fields
        .iter()
        .filter_map(|f| target.column(f))
        .map(|c| format!("{}, {}", literal(&c.field), select_expr(alias, c)))
        .collect();
    format!("json_build_object({})", pairs.join(", "))
}

fn preview_subquery(
    q: &mut QueryBuf,
    settings: &ResolvedSettings,
    entity: &ResolvedEntity,
    rel: &RelationInfo,
) -> Result<String, AppError> {
    let target = target_of(settings, rel)?;
    let src = relation_source(q, entity, target, rel, MAIN_ALIAS);
    let sql = if !rel.is_multi() {
        format!(
            "(SELECT {} FROM {} WHERE {} LIMIT 1)",
            preview_object(target, rel, &src.alias),
            src.from,
            src.on
        )
    } else if rel.presentation.display_mode == RelationDisplayMode::Count {
        format!("(SELECT COUNT(*) FROM {} WHERE {})", src.from, src.on)
    } else {
        format!(
            "(SELECT COALESCE(json_agg(p.preview), '[]'::json) FROM (SELECT {} AS preview FROM {} WHERE {} ORDER BY {} LIMIT {}) p)",
            preview_object(target, rel, &src.alias),
            src.from,
            src.on,
            column_ref(&src.alias, target.id_column()),
            PREVIEW_LIMIT
        )
    };
    Ok(sql)
}

/// Read-visible columns (id always) as `main."col" AS "field"`, then relation previews.
fn select_list(
    q: &mut QueryBuf,
    settings: &ResolvedSettings,
    entity: &ResolvedEntity,
    previews: bool,
) -> Result<String, AppError> {
    let mut parts: Vec<String> = entity
        .columns
        .iter()
        .filter(|c| c.visibility.read || c.field == entity.id_field)
        .map(|c| format!("{} AS {}", select_expr(MAIN_ALIAS, c), quoted(&c.field)))
        .collect();
    if previews {
        for rel in entity.relations.iter().filter(|r| r.visibility.read) {
            let sub = preview_subquery(q, settings, entity, rel)?;
            parts.push(format!("{} AS {}", sub, quoted(&rel.field)));
        }
    }
    Ok(parts.join(", "))
}

fn where_sql(
    q: &mut QueryBuf,
    settings: &ResolvedSettings,
    entity: &ResolvedEntity,
    filter: Option<&Value>,
) -> Result<String, AppError> {
    match filter {
        Some(w) => compile_where(q, settings, entity, MAIN_ALIAS, w),
        None => Ok("TRUE".into()),
    }
}

fn main_table(entity: &ResolvedEntity) -> String {
    format!("{} {}", qualified_table(&entity.schema_name, &entity.table_name), MAIN_ALIAS)
}

/// What a list or export SELECT returns.
pub struct SelectSpec<'a> {
    pub filter: Option<&'a Value>,
    pub order_by: &'a ColumnInfo,
    pub order: SortOrder,
    pub limit: Option<u32>,
    pub offset: u64,
    /// Embed relation previews (list view); export leaves them out.
    pub previews: bool,
}

pub fn select_rows(
    settings: &ResolvedSettings,
    entity: &ResolvedEntity,
    spec: &SelectSpec<'_>,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let cols = select_list(&mut q, settings, entity, spec.previews)?;
    let cond = where_sql(&mut q, settings, entity, spec.filter)?;
    let id = entity.id_column();
    let mut order = format!("{} {}", column_ref(MAIN_ALIAS, spec.order_by), spec.order.as_sql());
    if spec.order_by.field != id.field {
        order.push_str(&format!(", {} ASC", column_ref(MAIN_ALIAS, id)));
    }
    let limit_clause = spec.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = if spec.offset > 0 {
        format!(" OFFSET {}", spec.offset)
    } else {
        String::new()
    };
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}{}{}",
        cols,
        main_table(entity),
        cond,
        order,
        limit_clause,
        offset_clause
    );
    Ok(q)
}

pub fn count(settings: &ResolvedSettings, entity: &ResolvedEntity, filter: Option<&Value>) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let cond = where_sql(&mut q, settings, entity, filter)?;
    q.sql = format!("SELECT COUNT(*) AS count FROM {} WHERE {}", main_table(entity), cond);
    Ok(q)
}

/// SELECT one row by id, with relation previews.
pub fn select_by_id(settings: &ResolvedSettings, entity: &ResolvedEntity, id: &Value) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let cols = select_list(&mut q, settings, entity, true)?;
    let id_col = entity.id_column();
    let ph = q.push_column_param(id, id_col);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        cols,
        main_table(entity),
        column_ref(MAIN_ALIAS, id_col),
        ph
    );
    Ok(q)
}

fn returning_id(entity: &ResolvedEntity) -> String {
    let id = entity.id_column();
    format!("RETURNING {}::text AS {}", quoted(&id.column), quoted(&id.field))
}

/// INSERT the record's columns (keys are field names); absent columns take their database default.
pub fn insert(entity: &ResolvedEntity, record: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        if let Some(v) = record.get(&c.field) {
            placeholders.push(q.push_column_param(v, c));
            cols.push(quoted(&c.column));
        }
    }
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES {}", table, returning_id(entity))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning_id(entity)
        )
    };
    q
}

/// UPDATE by id: SET the record's columns and stamp `isUpdatedAt` columns. `None` when nothing to set.
pub fn update(entity: &ResolvedEntity, id: &Value, record: &Map<String, Value>) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let id_col = entity.id_column();
    let mut sets = Vec::new();
    for c in &entity.columns {
        if c.field == id_col.field || c.is_updated_at {
            continue;
        }
        if let Some(v) = record.get(&c.field) {
            let ph = q.push_column_param(v, c);
            sets.push(format!("{} = {}", quoted(&c.column), ph));
        }
    }
    if sets.is_empty() {
        return None;
    }
    for c in entity.columns.iter().filter(|c| c.is_updated_at) {
        sets.push(format!("{} = NOW()", quoted(&c.column)));
    }
    let id_ph = q.push_column_param(id, id_col);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} {}",
        table,
        sets.join(", "),
        quoted(&id_col.column),
        id_ph,
        returning_id(entity)
    );
    Some(q)
}

pub fn delete(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let id_col = entity.id_column();
    let ph = q.push_column_param(id, id_col);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} {}",
        table,
        quoted(&id_col.column),
        ph,
        returning_id(entity)
    );
    q
}

fn array_type(col: &ColumnInfo) -> String {
    format!("{}[]", col.pg_type)
}

pub fn delete_many(entity: &ResolvedEntity, ids: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let id_col = entity.id_column();
    let ph = q.push_param(&Value::Array(ids.to_vec()), &array_type(id_col));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ANY({}) {}",
        table,
        quoted(&id_col.column),
        ph,
        returning_id(entity)
    );
    q
}

/// Remove every join row of `id` in a join-table relation.
pub fn delete_join_rows(entity: &ResolvedEntity, join_table: &str, our_column: &str, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_column_param(id, entity.id_column());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        qualified_table(&entity.schema_name, join_table),
        quoted(our_column),
        ph
    );
    q
}

/// Link `id` to each of `their_ids` through a join table.
pub fn insert_join_rows(
    entity: &ResolvedEntity,
    target: &ResolvedEntity,
    link: (&str, &str, &str),
    id: &Value,
    their_ids: &[Value],
) -> QueryBuf {
    let (join_table, our_column, their_column) = link;
    let mut q = QueryBuf::new();
    let our_ph = q.push_column_param(id, entity.id_column());
    let their_ph = q.push_param(&Value::Array(their_ids.to_vec()), &array_type(target.id_column()));
    q.sql = format!(
        "INSERT INTO {} ({}, {}) SELECT {}, unnest({}) ON CONFLICT DO NOTHING",
        qualified_table(&entity.schema_name, join_table),
        quoted(our_column),
        quoted(their_column),
        our_ph,
        their_ph
    );
    q
}

/// Point the foreign key of each target row in `their_ids` at the row `id`.
pub fn connect_backward(
    entity: &ResolvedEntity,
    target: &ResolvedEntity,
    pairs: &[(String, String)],
    id: &Value,
    their_ids: &[Value],
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let id_col = entity.id_column();
    let our_ph = q.push_column_param(id, id_col);
    let our_table = qualified_table(&entity.schema_name, &entity.table_name);
    let sets: Vec<String> = pairs
        .iter()
        .map(|(ours, theirs)| {
            format!(
                "{} = (SELECT {} FROM {} WHERE {} = {})",
                quoted(theirs),
                quoted(ours),
                our_table,
                quoted(&id_col.column),
                our_ph
            )
        })
        .collect();
    let their_ph = q.push_param(&Value::Array(their_ids.to_vec()), &array_type(target.id_column()));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ANY({})",
        qualified_table(&target.schema_name, &target.table_name),
        sets.join(", "),
        quoted(&target.id_column().column),
        their_ph
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::blog;
    use serde_json::json;

    #[test]
    fn select_rows_with_previews() {
        let s = blog();
        let post = s.entity("Post").unwrap();
        let filter = json!({ "published": true });
        let q = select_rows(
            &s,
            post,
            &SelectSpec {
                filter: Some(&filter),
                order_by: post.column("title").unwrap(),
                order: SortOrder::Desc,
                limit: Some(20),
                offset: 40,
                previews: true,
            },
        )
        .unwrap();
        assert!(q.sql.starts_with("SELECT main.\"id\" AS \"id\", main.\"title\" AS \"title\""));
        assert!(!q.sql.contains("\"secret\""));
        assert!(q.sql.contains("main.\"author_id\" AS \"authorId\""));
        assert!(q.sql.contains("json_build_object('id', t0.\"id\", 'email', t0.\"email\")"));
        assert!(q.sql.contains("t0.\"id\" = main.\"author_id\""));
        assert!(q.sql.contains("JOIN \"public\".\"_PostToTag\""));
        assert!(q.sql.contains(&format!("LIMIT {}) p)", PREVIEW_LIMIT)));
        assert!(q.sql.ends_with("WHERE main.\"published\" = $1::bool ORDER BY main.\"title\" DESC, main.\"id\" ASC LIMIT 20 OFFSET 40"));
        assert_eq!(q.params, vec![PgBindValue::Text("true".into())]);
    }

    #[test]
    fn time_columns_are_selected_as_text() {
        let s = blog();
        let mut at = s.entity("Post").unwrap().column("updatedAt").unwrap().clone();
        assert_eq!(select_expr("main", &at), "main.\"updated_at\"");
        at.pg_type = "timetz".into();
        assert_eq!(select_expr("main", &at), "main.\"updated_at\"::text");
    }

    #[test]
    fn count_display_uses_count_subquery() {
        let s = blog();
        let user = s.entity("User").unwrap();
        let q = select_by_id(&s, user, &json!(7)).unwrap();
        assert!(q.sql.contains("(SELECT COUNT(*) FROM \"public\".\"Post\" t0 WHERE t0.\"author_id\" = main.\"id\") AS \"posts\""));
        assert!(q.sql.contains("main.\"role\"::text AS \"role\""));
        assert!(q.sql.ends_with("WHERE main.\"id\" = $1::int4"));
    }

    #[test]
    fn insert_skips_absent_columns() {
        let s = blog();
        let post = s.entity("Post").unwrap();
        let mut record = Map::new();
        record.insert("title".into(), json!("Hello"));
        record.insert("authorId".into(), json!(3));
        let q = insert(post, &record);
        assert_eq!(
            q.sql,
            "INSERT INTO \"public\".\"Post\" (\"title\", \"author_id\") VALUES ($1::text, $2::int4) RETURNING \"id\"::text AS \"id\""
        );
        let empty = insert(post, &Map::new());
        assert!(empty.sql.contains("DEFAULT VALUES"));
    }

    #[test]
    fn update_stamps_updated_at() {
        let s = blog();
        let post = s.entity("Post").unwrap();
        let mut record = Map::new();
        record.insert("title".into(), json!("New"));
        let q = update(post, &json!(1), &record).unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"public\".\"Post\" SET \"title\" = $1::text, \"updated_at\" = NOW() WHERE \"id\" = $2::int4 RETURNING \"id\"::text AS \"id\""
        );
        assert!(update(post, &json!(1), &Map::new()).is_none());
    }

    #[test]
    fn delete_many_binds_one_array() {
        let s = blog();
        let q = delete_many(s.entity("Archive").unwrap(), &[json!("a"), json!("b")]);
        assert!(q.sql.contains("= ANY($1::uuid[])"));
        assert_eq!(q.params, vec![PgBindValue::Text("{\"a\",\"b\"}".into())]);
    }

    #[test]
    fn relation_writes() {
        let s = blog();
        let post = s.entity("Post").unwrap();
        let tag = s.entity("Tag").unwrap();
        let q = insert_join_rows(post, tag, ("_PostToTag", "A", "B"), &json!(1), &[json!(2), json!(3)]);
        assert_eq!(
            q.sql,
            "INSERT INTO \"public\".\"_PostToTag\" (\"A\", \"B\") SELECT $1::int4, unnest($2::int4[]) ON CONFLICT DO NOTHING"
        );

        let user = s.entity("User").unwrap();
        let q = connect_backward(user, post, &[("id".into(), "author_id".into())], &json!(5), &[json!(1)]);
        assert_eq!(
            q.sql,
            "UPDATE \"public\".\"Post\" SET \"author_id\" = (SELECT \"id\" FROM \"public\".\"users\" WHERE \"id\" = $1::int4) WHERE \"id\" = ANY($2::int4[])"
        );
    }
}
