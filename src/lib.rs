//! Admin SDK: settings-driven admin backend over PostgreSQL.
//!
//! A JSON settings document describes models, fields, relations and enums. From it the crate
//! serves paginated, filtered and searchable CRUD, relation previews, and CSV import/export.

pub mod case;
pub mod error;
pub mod handlers;
pub mod options;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod transfer;

#[cfg(test)]
mod test_support;

pub use error::{AppError, ConfigError};
pub use options::AdminOptions;
pub use query::{build_where, decode_filters, encode_filters, FilterOperator, FilterValue, ListOptions};
pub use response::{success_one, success_one_ok, success_page};
pub use routes::{admin_router, common_routes, common_routes_with_ready, entity_routes, settings_routes};
pub use service::{CrudService, Page, RequestValidator};
pub use settings::{resolve, AdminSettings, ResolvedSettings, SettingsStore};
pub use state::AppState;
pub use transfer::{export_csv, import_csv, ImportReport};
