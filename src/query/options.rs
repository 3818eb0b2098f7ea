//! List options: pagination, ordering, search and filters.

use crate::error::AppError;
use crate::query::filter::{decode_filters, FilterValue};
use serde::{Deserialize, Serialize};

pub const MAX_PER_PAGE: u32 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListOptions {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub order_by: Option<String>,
    pub order: SortOrder,
    pub search: Option<String>,
    pub filters: Vec<FilterValue>,
}

impl ListOptions {
    /// 1-based page; 0 and missing become 1.
    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    /// Page size, defaulting to `default_per_page` and capped at [`MAX_PER_PAGE`].
    pub fn per_page(&self, default_per_page: u32) -> u32 {
        self.per_page
            .filter(|p| *p > 0)
            .unwrap_or(default_per_page)
            .clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self, default_per_page: u32) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.per_page(default_per_page))
    }
}

/// Query string form of [`ListOptions`]; `filters` uses the encoded wire format.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub order_by: Option<String>,
    #[serde(default)]
    pub order: SortOrder,
    pub search: Option<String>,
    pub filters: Option<String>,
}

impl TryFrom<ListQuery> for ListOptions {
    type Error = AppError;

    fn try_from(q: ListQuery) -> Result<Self, Self::Error> {
        let filters = match q.filters.as_deref() {
            Some(raw) => decode_filters(raw)?,
            None => Vec::new(),
        };
        Ok(ListOptions {
            page: q.page,
            per_page: q.per_page,
            order_by: q.order_by.filter(|s| !s.is_empty()),
            order: q.order,
            search: q.search.filter(|s| !s.trim().is_empty()),
            filters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::{encode_filters, FilterOperator};
    use serde_json::json;

    #[test]
    fn paging_defaults_and_cap() {
        let opts = ListOptions::default();
        assert_eq!(opts.page(), 1);
        assert_eq!(opts.per_page(20), 20);
        assert_eq!(opts.offset(20), 0);

        let opts = ListOptions {
            page: Some(3),
            per_page: Some(500),
            ..Default::default()
        };
        assert_eq!(opts.per_page(20), MAX_PER_PAGE);
        assert_eq!(opts.offset(20), 200);
    }

    #[test]
    fn from_query_decodes_filters() {
        let filters = vec![FilterValue::new("views", FilterOperator::Gt, json!(3))];
        let q = ListQuery {
            order: SortOrder::Desc,
            search: Some("  ".into()),
            filters: Some(encode_filters(&filters).unwrap()),
            ..Default::default()
        };
        let opts = ListOptions::try_from(q).unwrap();
        assert_eq!(opts.filters, filters);
        assert_eq!(opts.order, SortOrder::Desc);
        assert!(opts.search.is_none());
    }

    #[test]
    fn bad_filters_are_rejected() {
        let q = ListQuery {
            filters: Some("not-json".into()),
            ..Default::default()
        };
        assert!(matches!(ListOptions::try_from(q), Err(AppError::BadRequest(_))));
    }
}
