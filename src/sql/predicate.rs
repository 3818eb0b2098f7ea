//! Compile a where object into a parameterized SQL boolean expression.

use crate::error::AppError;
use crate::settings::{ColumnInfo, RelationInfo, ResolvedEntity, ResolvedSettings};
use crate::sql::builder::{column_ref, relation_source, target_of, QueryBuf};
use serde_json::{Map, Value};

/// Compile `filter` for rows of `entity` aliased as `alias`. Parameters are appended to `q`.
pub fn compile_where(
    q: &mut QueryBuf,
    settings: &ResolvedSettings,
    entity: &ResolvedEntity,
    alias: &str,
    filter: &Value,
) -> Result<String, AppError> {
    let Value::Object(map) = filter else {
        return Err(AppError::BadRequest(format!("where must be an object, got {}", filter)));
    };
    let mut parts = Vec::with_capacity(map.len());
    for (key, cond) in map {
        let part = match key.as_str() {
            "AND" => join(compile_list(q, settings, entity, alias, cond)?, " AND ", "TRUE"),
            "OR" => join(compile_list(q, settings, entity, alias, cond)?, " OR ", "FALSE"),
            "NOT" => format!("NOT {}", join(compile_list(q, settings, entity, alias, cond)?, " AND ", "TRUE")),
            field => {
                if let Some(col) = entity.column(field) {
                    compile_column(q, alias, col, cond)?
                } else if let Some(rel) = entity.relation(field) {
                    compile_relation(q, settings, entity, alias, rel, cond)?
                } else {
                    return Err(AppError::BadRequest(format!("unknown field '{}' on {}", field, entity.name)));
                }
            }
        };
        parts.push(part);
    }
    Ok(join(parts, " AND ", "TRUE"))
}

/// `AND`/`OR`/`NOT` take an array of where objects or a single one.
fn compile_list(
    q: &mut QueryBuf,
    settings: &ResolvedSettings,
    entity: &ResolvedEntity,
    alias: &str,
    cond: &Value,
) -> Result<Vec<String>, AppError> {
    match cond {
        Value::Array(items) => items
            .iter()
            .map(|w| compile_where(q, settings, entity, alias, w))
            .collect(),
        Value::Object(_) => Ok(vec![compile_where(q, settings, entity, alias, cond)?]),
        other => Err(AppError::BadRequest(format!("logical operator needs an object or array, got {}", other))),
    }
}

fn join(parts: Vec<String>, sep: &str, empty: &str) -> String {
    match parts.len() {
        0 => empty.to_string(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => format!("({})", parts.join(sep)),
    }
}

/// Escape LIKE wildcards so the value matches literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn compile_column(q: &mut QueryBuf, alias: &str, col: &ColumnInfo, cond: &Value) -> Result<String, AppError> {
    let r = column_ref(alias, col);
    let ops = match cond {
        Value::Null => return Ok(format!("{} IS NULL", r)),
        Value::Object(ops) => ops,
        literal => return Ok(format!("{} = {}", r, q.push_column_param(literal, col))),
    };
    let insensitive = ops.get("mode").and_then(Value::as_str) == Some("insensitive");
    let mut parts = Vec::new();
    for (op, v) in ops {
        if op == "mode" {
            continue;
        }
        if col.is_list && !matches!(op.as_str(), "equals" | "not") {
            return Err(AppError::BadRequest(format!("operator '{}' is not supported on list field '{}'", op, col.field)));
        }
        let part = match op.as_str() {
            "equals" if v.is_null() => format!("{} IS NULL", r),
            "equals" => format!("{} = {}", r, q.push_column_param(v, col)),
            "not" => match v {
                Value::Null => format!("{} IS NOT NULL", r),
                Value::Object(_) => format!("NOT {}", compile_column(q, alias, col, v)?),
                _ => format!("{} IS DISTINCT FROM {}", r, q.push_column_param(v, col)),
            },
            "in" | "notIn" => {
                let items = v
                    .as_array()
                    .ok_or_else(|| AppError::BadRequest(format!("'{}' on '{}' needs an array", op, col.field)))?;
                match (items.is_empty(), op.as_str()) {
                    (true, "in") => "FALSE".to_string(),
                    (true, _) => "TRUE".to_string(),
                    (false, op) => {
                        let phs: Vec<String> = items.iter().map(|i| q.push_column_param(i, col)).collect();
                        let kw = if op == "in" { "IN" } else { "NOT IN" };
                        format!("{} {} ({})", r, kw, phs.join(", "))
                    }
                }
            }
            "lt" | "lte" | "gt" | "gte" => {
                let sym = match op.as_str() {
                    "lt" => "<",
                    "lte" => "<=",
                    "gt" => ">",
                    _ => ">=",
                };
                format!("{} {} {}", r, sym, q.push_column_param(v, col))
            }
            "contains" | "startsWith" | "endsWith" => {
                let text = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let text = escape_like(&text);
                let pattern = match op.as_str() {
                    "contains" => format!("%{}%", text),
                    "startsWith" => format!("{}%", text),
                    _ => format!("%{}", text),
                };
                let kw = if insensitive { "ILIKE" } else { "LIKE" };
                format!("{}::text {} {}", r, kw, q.push_param(&Value::String(pattern), "text"))
            }
            other => {
                return Err(AppError::BadRequest(format!("unknown operator '{}' on '{}'", other, col.field)));
            }
        };
        parts.push(part);
    }
    Ok(join(parts, " AND ", "TRUE"))
}

/// A scalar given where a related-row filter is expected means "the row with this id".
fn nested_where(target: &ResolvedEntity, v: &Value) -> Value {
    match v {
        Value::Object(_) => v.clone(),
        other => {
            let mut m = Map::new();
            m.insert(target.id_field.clone(), other.clone());
            Value::Object(m)
        }
    }
}

fn compile_relation(
    q: &mut QueryBuf,
    settings: &ResolvedSettings,
    entity: &ResolvedEntity,
    alias: &str,
    rel: &RelationInfo,
    cond: &Value,
) -> Result<String, AppError> {
    let target = target_of(settings, rel)?;
    let exists = |q: &mut QueryBuf, inner: Option<&Value>, negate_inner: bool| -> Result<String, AppError> {
        let src = relation_source(q, entity, target, rel, alias);
        let mut cond_sql = src.on.clone();
        if let Some(inner) = inner {
            let w = compile_where(q, settings, target, &src.alias, &nested_where(target, inner))?;
            if negate_inner {
                cond_sql = format!("{} AND NOT {}", cond_sql, w);
            } else {
                cond_sql = format!("{} AND {}", cond_sql, w);
            }
        }
        Ok(format!("EXISTS (SELECT 1 FROM {} WHERE {})", src.from, cond_sql))
    };

    let ops = match cond {
        Value::Null => return Ok(format!("NOT {}", exists(q, None, false)?)),
        Value::Object(ops) => ops,
        scalar if !rel.is_multi() => return exists(q, Some(scalar), false),
        other => {
            return Err(AppError::BadRequest(format!("invalid filter on relation '{}': {}", rel.field, other)));
        }
    };

    let relation_keys: &[&str] = if rel.is_multi() {
        &["some", "every", "none", "not"]
    } else {
        &["is", "isNot", "equals", "not"]
    };
    if !ops.keys().any(|k| relation_keys.contains(&k.as_str())) {
        if rel.is_multi() {
            return Err(AppError::BadRequest(format!(
                "relation '{}' needs one of some, every, none",
                rel.field
            )));
        }
        // bare nested where on a single relation
        return exists(q, Some(cond), false);
    }

    let mut parts = Vec::new();
    for (op, v) in ops {
        let inner = if v.is_null() { None } else { Some(v) };
        let part = match (op.as_str(), rel.is_multi()) {
            ("is" | "equals", false) => match inner {
                Some(w) => exists(q, Some(w), false)?,
                None => format!("NOT {}", exists(q, None, false)?),
            },
            ("isNot" | "not", false) => match inner {
                Some(w) => format!("NOT {}", exists(q, Some(w), false)?),
                None => exists(q, None, false)?,
            },
            ("not", true) if inner.is_none() => exists(q, None, false)?,
            ("some", true) => exists(q, inner, false)?,
            ("none", true) => format!("NOT {}", exists(q, inner, false)?),
            ("every", true) => match inner {
                Some(w) => format!("NOT {}", exists(q, Some(w), true)?),
                None => "TRUE".to_string(),
            },
            (other, _) => {
                return Err(AppError::BadRequest(format!(
                    "operator '{}' is not valid for relation '{}'",
                    other, rel.field
                )));
            }
        };
        parts.push(part);
    }
    Ok(join(parts, " AND ", "TRUE"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::params::PgBindValue;
    use crate::test_support::blog;
    use serde_json::json;

    fn compile(model: &str, w: Value) -> Result<(String, Vec<PgBindValue>), AppError> {
        let s = blog();
        let entity = s.entity(model).unwrap();
        let mut q = QueryBuf::new();
        let sql = compile_where(&mut q, &s, entity, "main", &w)?;
        Ok((sql, q.params))
    }

    fn text(s: &str) -> PgBindValue {
        PgBindValue::Text(s.into())
    }

    #[test]
    fn scalar_operators() {
        let (sql, params) = compile("Post", json!({ "views": { "gte": 10, "lt": 20 } })).unwrap();
        assert_eq!(sql, "(main.\"views\" >= $1::int4 AND main.\"views\" < $2::int4)");
        assert_eq!(params, vec![text("10"), text("20")]);

        let (sql, _) = compile("Post", json!({ "authorId": null })).unwrap();
        assert_eq!(sql, "main.\"author_id\" IS NULL");
        let (sql, _) = compile("Post", json!({ "authorId": { "not": null } })).unwrap();
        assert_eq!(sql, "main.\"author_id\" IS NOT NULL");
    }

    #[test]
    fn insensitive_match_escapes_wildcards() {
        let (sql, params) = compile("Post", json!({ "title": { "contains": "50%_off", "mode": "insensitive" } })).unwrap();
        assert_eq!(sql, "main.\"title\"::text ILIKE $1::text");
        assert_eq!(params, vec![text("%50\\%\\_off%")]);

        let (sql, params) = compile("Post", json!({ "title": { "startsWith": "He" } })).unwrap();
        assert_eq!(sql, "main.\"title\"::text LIKE $1::text");
        assert_eq!(params, vec![text("He%")]);
    }

    #[test]
    fn in_lists() {
        let (sql, _) = compile("Post", json!({ "id": { "in": [1, 2] } })).unwrap();
        assert_eq!(sql, "main.\"id\" IN ($1::int4, $2::int4)");
        assert_eq!(compile("Post", json!({ "id": { "in": [] } })).unwrap().0, "FALSE");
        assert_eq!(compile("Post", json!({ "id": { "notIn": [] } })).unwrap().0, "TRUE");
    }

    #[test]
    fn logical_operators() {
        let (sql, _) = compile(
            "Post",
            json!({ "AND": [
                { "published": true },
                { "OR": [{ "title": { "contains": "a", "mode": "insensitive" } }, { "views": 3 }] }
            ]}),
        )
        .unwrap();
        assert_eq!(
            sql,
            "(main.\"published\" = $1::bool AND (main.\"title\"::text ILIKE $2::text OR main.\"views\" = $3::int4))"
        );
        assert_eq!(compile("Post", json!({ "OR": [] })).unwrap().0, "FALSE");
        assert_eq!(compile("Post", json!({})).unwrap().0, "TRUE");
        assert_eq!(
            compile("Post", json!({ "NOT": { "published": true } })).unwrap().0,
            "NOT main.\"published\" = $1::bool"
        );
    }

    #[test]
    fn single_relation_filters() {
        let (sql, params) = compile("Post", json!({ "author": { "is": { "email": "a@b.c" } } })).unwrap();
        assert_eq!(
            sql,
            "EXISTS (SELECT 1 FROM \"public\".\"users\" t0 WHERE t0.\"id\" = main.\"author_id\" AND t0.\"email\" = $1::text)"
        );
        assert_eq!(params, vec![text("a@b.c")]);

        let (bare, _) = compile("Post", json!({ "author": { "email": "a@b.c" } })).unwrap();
        assert_eq!(bare, sql);

        let (by_id, params) = compile("Post", json!({ "author": { "equals": 3 } })).unwrap();
        assert!(by_id.ends_with("AND t0.\"id\" = $1::int4)"));
        assert_eq!(params, vec![text("3")]);

        let (none, _) = compile("Post", json!({ "author": null })).unwrap();
        assert!(none.starts_with("NOT EXISTS"));
    }

    #[test]
    fn multi_relation_filters() {
        let (sql, _) = compile("User", json!({ "posts": { "some": { "published": true } } })).unwrap();
        assert_eq!(
            sql,
            "EXISTS (SELECT 1 FROM \"public\".\"Post\" t0 WHERE t0.\"author_id\" = main.\"id\" AND t0.\"published\" = $1::bool)"
        );
        let (every, _) = compile("User", json!({ "posts": { "every": { "published": true } } })).unwrap();
        assert!(every.starts_with("NOT EXISTS"));
        assert!(every.contains("AND NOT t0.\"published\" = $1::bool"));

        let (tags, _) = compile("Post", json!({ "tags": { "none": { "label": "x" } } })).unwrap();
        assert_eq!(
            tags,
            "NOT EXISTS (SELECT 1 FROM \"public\".\"Tag\" t0 JOIN \"public\".\"_PostToTag\" t1 ON t1.\"B\" = t0.\"id\" WHERE t1.\"A\" = main.\"id\" AND t0.\"label\" = $1::text)"
        );
        assert!(compile("User", json!({ "posts": { "is": {} } })).is_err());
    }

    #[test]
    fn multi_relation_null_checks_mirror_each_other() {
        let (empty, _) = compile("User", json!({ "posts": null })).unwrap();
        let (non_empty, _) = compile("User", json!({ "posts": { "not": null } })).unwrap();
        assert_eq!(
            non_empty,
            "EXISTS (SELECT 1 FROM \"public\".\"Post\" t0 WHERE t0.\"author_id\" = main.\"id\")"
        );
        assert_eq!(empty, format!("NOT {}", non_empty));
        // `not` with a nested filter stays invalid on list relations
        assert!(matches!(
            compile("User", json!({ "posts": { "not": { "published": true } } })),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn unknown_names_are_bad_requests() {
        assert!(matches!(compile("Post", json!({ "nope": 1 })), Err(AppError::BadRequest(_))));
        assert!(matches!(
            compile("Post", json!({ "views": { "near": 1 } })),
            Err(AppError::BadRequest(_))
        ));
    }
}
