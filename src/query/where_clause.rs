//! Translate filter descriptors and free-text search into a where object.

use crate::query::filter::{FilterKind, FilterOperator, FilterValue};
use crate::settings::{AdminField, FieldKind};
use serde_json::{json, Map, Value};

/// Filters and search combined with AND. `None` means no constraint.
pub fn build_where(filters: &[FilterValue], search: Option<&str>, search_fields: &[AdminField]) -> Option<Value> {
    let filter_predicate = build_filter_predicate(filters);
    let search_predicate = search.and_then(|s| build_search_predicate(s, search_fields));
    combine(filter_predicate, search_predicate)
}

pub fn combine(left: Option<Value>, right: Option<Value>) -> Option<Value> {
    match (left, right) {
        (Some(l), Some(r)) => Some(json!({ "AND": [l, r] })),
        (l, r) => l.or(r),
    }
}

/// One entry per field; a later descriptor on the same field replaces an earlier one.
pub fn build_filter_predicate(filters: &[FilterValue]) -> Option<Value> {
    let mut out = Map::new();
    for f in filters {
        if let Some(condition) = filter_condition(f) {
            out.insert(f.field.clone(), condition);
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(Value::Object(out))
    }
}

fn filter_condition(f: &FilterValue) -> Option<Value> {
    match f.operator {
        FilterOperator::IsNull => return Some(Value::Null),
        FilterOperator::IsNotNull => return Some(json!({ "not": null })),
        _ => {}
    }
    if f.has_empty_value() {
        return None;
    }
    if f.is_relation() {
        return Some(single_key(f.operator.as_key(), f.value.clone()));
    }

    if matches!(f.operator, FilterOperator::In | FilterOperator::NotIn) {
        let list = coerce(&as_list(f.value.clone()), f.kind);
        return Some(single_key(f.operator.as_key(), list));
    }
    let value = coerce(&f.value, f.kind);
    let condition = match f.operator {
        FilterOperator::Equals => value,
        op if op.is_text_match() => json!({ op.as_key(): value, "mode": "insensitive" }),
        op => single_key(op.as_key(), value),
    };
    Some(condition)
}

fn single_key(key: &str, value: Value) -> Value {
    let mut m = Map::new();
    m.insert(key.to_string(), value);
    Value::Object(m)
}

fn coerce(value: &Value, kind: Option<FilterKind>) -> Value {
    match (kind, value) {
        (_, Value::Array(items)) => Value::Array(items.iter().map(|v| coerce(v, kind)).collect()),
        (Some(FilterKind::Number), Value::String(s)) => {
            let t = s.trim();
            if let Ok(n) = t.parse::<i64>() {
                json!(n)
            } else if let Some(n) = t.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Value::Number(n)
            } else {
                value.clone()
            }
        }
        (Some(FilterKind::Boolean), Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

/// `in`/`notIn` accept an array, a comma-separated string, or a single value.
fn as_list(value: Value) -> Value {
    match value {
        Value::Array(_) => value,
        Value::String(s) => Value::Array(
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| Value::String(p.to_string()))
                .collect(),
        ),
        other => Value::Array(vec![other]),
    }
}

/// OR over the fields that can match `search`; `None` when the text is blank or nothing matches.
pub fn build_search_predicate(search: &str, fields: &[AdminField]) -> Option<Value> {
    let q = search.trim();
    if q.is_empty() {
        return None;
    }
    let int_value = q.parse::<i64>().ok();
    let float_value = q.parse::<f64>().ok().filter(|f| f.is_finite());

    let mut clauses = Vec::new();
    for f in fields {
        if f.kind != FieldKind::Scalar || f.is_list {
            continue;
        }
        let clause = match f.type_.as_str() {
            "String" => Some(json!({ "contains": q, "mode": "insensitive" })),
            "Int" => int_value.filter(|n| i32::try_from(*n).is_ok()).map(|n| json!(n)),
            "BigInt" => int_value.map(|n| json!(n)),
            "Float" | "Decimal" => float_value.map(|n| json!(n)),
            _ => None,
        };
        if let Some(clause) = clause {
            clauses.push(single_key(&f.name, clause));
        }
    }
    if clauses.is_empty() {
        None
    } else {
        Some(json!({ "OR": clauses }))
    }
}
