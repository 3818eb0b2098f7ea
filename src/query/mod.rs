pub mod filter;
pub mod options;
pub mod where_clause;

pub use filter::{decode_filters, encode_filters, FilterKind, FilterOperator, FilterValue};
pub use options::{ListOptions, ListQuery, SortOrder, MAX_PER_PAGE};
pub use where_clause::{build_filter_predicate, build_search_predicate, build_where, combine};
