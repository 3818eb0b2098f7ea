//! Filter descriptors and their URL wire format (JSON, percent-encoded).

use crate::error::AppError;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    Not,
    In,
    NotIn,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    // relation-only
    Is,
    IsNot,
    Some,
    Every,
    None,
}

impl FilterOperator {
    /// Key used in the where object.
    pub fn as_key(self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::Not => "not",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "notIn",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::IsNull => "isNull",
            FilterOperator::IsNotNull => "isNotNull",
            FilterOperator::Is => "is",
            FilterOperator::IsNot => "isNot",
            FilterOperator::Some => "some",
            FilterOperator::Every => "every",
            FilterOperator::None => "none",
        }
    }

    pub fn is_null_check(self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }

    pub fn is_text_match(self) -> bool {
        matches!(
            self,
            FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith
        )
    }

    pub fn is_relation_only(self) -> bool {
        matches!(
            self,
            FilterOperator::Is
                | FilterOperator::IsNot
                | FilterOperator::Some
                | FilterOperator::Every
                | FilterOperator::None
        )
    }
}

/// Value kind of a filter, used for coercion and to tell relation filters apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKind {
    String,
    Number,
    Boolean,
    Date,
    Enum,
    Relation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterValue {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FilterKind>,
}

impl FilterValue {
    pub fn new(field: &str, operator: FilterOperator, value: Value) -> Self {
        FilterValue {
            field: field.to_string(),
            operator,
            value,
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: FilterKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Declared as a relation filter, or using an operator only relations accept.
    pub fn is_relation(&self) -> bool {
        self.kind == Some(FilterKind::Relation) || self.operator.is_relation_only()
    }

    /// Null, the empty string and the empty array mark an inactive filter.
    pub fn has_empty_value(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            _ => false,
        }
    }
}

/// Encode filters for the `filters` query parameter.
pub fn encode_filters(filters: &[FilterValue]) -> Result<String, AppError> {
    let json = serde_json::to_string(filters).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(utf8_percent_encode(&json, NON_ALPHANUMERIC).to_string())
}

/// Decode the `filters` query parameter. Accepts percent-encoded or already-decoded JSON.
pub fn decode_filters(raw: &str) -> Result<Vec<FilterValue>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let decoded = if raw.starts_with('[') {
        raw.to_string()
    } else {
        percent_decode_str(raw)
            .decode_utf8()
            .map_err(|e| AppError::BadRequest(format!("filters: {}", e)))?
            .into_owned()
    };
    serde_json::from_str(&decoded).map_err(|e| AppError::BadRequest(format!("filters: {}", e)))
}
