//! Runtime options read from the environment.

use crate::error::ConfigError;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct AdminOptions {
    pub database_url: String,
    pub settings_path: PathBuf,
    /// Schema for models that do not name one.
    pub schema: String,
    pub per_page: u32,
    pub import_batch_size: usize,
    /// Body limit of the CSV import route.
    pub import_max_bytes: usize,
}

impl Default for AdminOptions {
    fn default() -> Self {
        AdminOptions {
            database_url: "postgres://localhost/admin".into(),
            settings_path: PathBuf::from("admin-settings.json"),
            schema: "public".into(),
            per_page: 20,
            import_batch_size: crate::transfer::DEFAULT_BATCH_SIZE,
            import_max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl AdminOptions {
    /// `DATABASE_URL`, `ADMIN_SETTINGS_PATH`, `ADMIN_SCHEMA`, `ADMIN_PER_PAGE`,
    /// `ADMIN_IMPORT_BATCH_SIZE`, `ADMIN_IMPORT_MAX_BYTES`; unset variables keep the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut opts = AdminOptions::default();
        if let Some(v) = lookup("DATABASE_URL") {
            opts.database_url = v;
        }
        if let Some(v) = lookup("ADMIN_SETTINGS_PATH") {
            opts.settings_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ADMIN_SCHEMA") {
            opts.schema = v;
        }
        if let Some(v) = lookup("ADMIN_PER_PAGE") {
            opts.per_page = positive("ADMIN_PER_PAGE", &v)?;
        }
        if let Some(v) = lookup("ADMIN_IMPORT_BATCH_SIZE") {
            opts.import_batch_size = positive("ADMIN_IMPORT_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("ADMIN_IMPORT_MAX_BYTES") {
            opts.import_max_bytes = positive("ADMIN_IMPORT_MAX_BYTES", &v)?;
        }
        Ok(opts)
    }
}

fn positive<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(ConfigError::Validation(format!("{} must be a positive integer, got '{}'", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let opts = AdminOptions::from_lookup(lookup(&[])).unwrap();
        assert_eq!(opts, AdminOptions::default());
        assert_eq!(opts.per_page, 20);
        assert_eq!(opts.import_batch_size, 50);
    }

    #[test]
    fn overrides_and_errors() {
        let opts = AdminOptions::from_lookup(lookup(&[("ADMIN_SCHEMA", "app"), ("ADMIN_PER_PAGE", "50")])).unwrap();
        assert_eq!(opts.schema, "app");
        assert_eq!(opts.per_page, 50);
        assert!(matches!(
            AdminOptions::from_lookup(lookup(&[("ADMIN_IMPORT_BATCH_SIZE", "0")])),
            Err(ConfigError::Validation(_))
        ));
        assert!(AdminOptions::from_lookup(lookup(&[("ADMIN_PER_PAGE", "lots")])).is_err());
    }
}
