//! Convert serde_json::Value to a bindable parameter.
//!
//! Every value is sent as text and cast in SQL (`$n::int4`, `$n::jsonb`, ...), so the
//! column's PostgreSQL type decides how the text is parsed.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Text(String),
}

impl PgBindValue {
    /// Text form of `v` for a parameter cast to `pg_type`.
    pub fn for_type(v: &Value, pg_type: &str) -> Self {
        if v.is_null() {
            return PgBindValue::Null;
        }
        if is_json_type(pg_type) {
            return PgBindValue::Text(v.to_string());
        }
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Text(b.to_string()),
            Value::Number(n) => PgBindValue::Text(n.to_string()),
            Value::String(s) => PgBindValue::Text(s.clone()),
            Value::Array(items) => PgBindValue::Text(array_literal(items)),
            Value::Object(_) => PgBindValue::Text(v.to_string()),
        }
    }
}

fn is_json_type(pg_type: &str) -> bool {
    matches!(pg_type, "json" | "jsonb")
}

/// PostgreSQL array literal: `{"a","b",NULL}`.
fn array_literal(items: &[Value]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|v| match v {
            Value::Null => "NULL".to_string(),
            Value::String(s) => quote_element(s),
            Value::Array(inner) => array_literal(inner),
            other => quote_element(&other.to_string()),
        })
        .collect();
    format!("{{{}}}", parts.join(","))
}

fn quote_element(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::Null => Ok(IsNull::Yes),
            PgBindValue::Text(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf),
        }
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}
