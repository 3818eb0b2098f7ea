//! CSV import and export.

pub mod export;
pub mod import;

pub use export::{export_columns, export_csv};
pub use import::{
    import_csv, suggest_mapping, ImportReport, ImportRequest, PgRecordWriter, RecordWriter, DEFAULT_BATCH_SIZE,
    MAX_IMPORT_ERRORS,
};
