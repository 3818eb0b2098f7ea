//! CrudService: generic CRUD using the safe SQL builder.

pub mod convert;
mod crud;
mod validation;
pub use convert::{convert_cell, convert_value};
pub use crud::{CrudService, Page};
pub(crate) use crud::insert_record;
pub use validation::{ensure_allowed, validate_field, Action, PreparedRecord, RelationWrite, RequestValidator};
pub(crate) use validation::writable_column;
