//! Field value conversion by scalar type, shared by CRUD payloads and CSV import.

use crate::error::AppError;
use crate::settings::{ColumnInfo, ScalarType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Number, Value};
use std::collections::HashMap;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

fn invalid(col: &ColumnInfo, what: &str, shown: &str) -> AppError {
    AppError::invalid_value(&col.field, format!("Invalid {} value for {}: {}", what, col.title, shown))
}

fn shown(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert one CSV cell. An empty cell is null, or the empty string for `String` fields.
pub fn convert_cell(col: &ColumnInfo, cell: &str, enums: &HashMap<String, Vec<String>>) -> Result<Value, AppError> {
    if cell.is_empty() {
        return Ok(if col.scalar == ScalarType::String && !col.is_list {
            Value::String(String::new())
        } else {
            Value::Null
        });
    }
    convert_value(col, &Value::String(cell.to_string()), enums)
}

/// Convert a payload value to the canonical JSON form for the column's type.
pub fn convert_value(col: &ColumnInfo, v: &Value, enums: &HashMap<String, Vec<String>>) -> Result<Value, AppError> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    if !col.is_list {
        return convert_scalar(col, v, enums);
    }
    let items = match v {
        Value::Array(items) => items.clone(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            Ok(_) => vec![v.clone()],
            Err(e) => return Err(invalid(col, "JSON", &e.to_string())),
        },
        other => vec![other.clone()],
    };
    items
        .iter()
        .map(|item| {
            if item.is_null() {
                Ok(Value::Null)
            } else {
                convert_scalar(col, item, enums)
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn convert_scalar(col: &ColumnInfo, v: &Value, enums: &HashMap<String, Vec<String>>) -> Result<Value, AppError> {
    match &col.scalar {
        ScalarType::Int | ScalarType::BigInt => {
            let n = match v {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            let n = n
                .filter(|n| col.scalar == ScalarType::BigInt || i32::try_from(*n).is_ok())
                .ok_or_else(|| invalid(col, "integer", &shown(v)))?;
            Ok(Value::Number(n.into()))
        }
        ScalarType::Float => {
            let f = match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            f.and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid(col, "number", &shown(v)))
        }
        // Kept as text so precision survives the round trip.
        ScalarType::Decimal => match v {
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::String(s) if s.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false) => {
                Ok(Value::String(s.trim().to_string()))
            }
            _ => Err(invalid(col, "number", &shown(v))),
        },
        ScalarType::Boolean => {
            let b = match v {
                Value::Bool(b) => Some(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(1) => Some(true),
                    Some(0) => Some(false),
                    _ => None,
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" => Some(true),
                    "false" | "0" | "no" => Some(false),
                    _ => None,
                },
                _ => None,
            };
            b.map(Value::Bool).ok_or_else(|| invalid(col, "boolean", &shown(v)))
        }
        ScalarType::DateTime if col.is_time_of_day() => match v {
            Value::String(s) => parse_time(s.trim())
                .map(Value::String)
                .ok_or_else(|| invalid(col, "time", s)),
            _ => Err(invalid(col, "time", &shown(v))),
        },
        ScalarType::DateTime => match v {
            Value::String(s) => parse_datetime(s.trim())
                .map(Value::String)
                .ok_or_else(|| invalid(col, "date", s)),
            _ => Err(invalid(col, "date", &shown(v))),
        },
        ScalarType::Json => match v {
            Value::String(s) => serde_json::from_str(s).map_err(|e| invalid(col, "JSON", &e.to_string())),
            other => Ok(other.clone()),
        },
        ScalarType::Enum(name) => {
            let s = match v {
                Value::String(s) => s.trim(),
                _ => return Err(invalid(col, "enum", &shown(v))),
            };
            match enums.get(name) {
                Some(values) if !values.iter().any(|e| e == s) => Err(invalid(col, "enum", s)),
                _ => Ok(Value::String(s.to_string())),
            }
        }
        ScalarType::String | ScalarType::Bytes => match v {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(_) | Value::Bool(_) => Ok(Value::String(v.to_string())),
            _ => Err(AppError::invalid_value(
                &col.field,
                format!("Invalid text value for {}: {}", col.title, v),
            )),
        },
    }
}

/// RFC 3339 (normalized to UTC), `YYYY-MM-DD HH:MM:SS[.f]` or a bare date.
fn parse_datetime(s: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc().format(DATETIME_FORMAT).to_string());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.format(DATETIME_FORMAT).to_string());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.format(DATETIME_FORMAT).to_string())
}

/// `HH:MM[:SS[.f]]` with an optional `Z` or `±HH[:MM]` offset, which is kept as given.
fn parse_time(s: &str) -> Option<String> {
    let split = s
        .char_indices()
        .skip(5)
        .find(|(_, c)| matches!(c, '+' | '-' | 'Z' | 'z'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (clock, offset) = s.split_at(split);
    let time = ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(clock.trim(), fmt).ok())?;
    let offset_ok = offset.is_empty()
        || offset.eq_ignore_ascii_case("z")
        || offset[1..].split(':').all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_digit()));
    if !offset_ok {
        return None;
    }
    Some(format!("{}{}", time.format(TIME_FORMAT), offset))
}
