//! Shared application state for all routes. Settings are re-read from the file on each request.

use crate::error::AppError;
use crate::options::AdminOptions;
use crate::settings::{resolve, ResolvedSettings, SettingsStore};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: SettingsStore,
    pub options: Arc<AdminOptions>,
}

impl AppState {
    pub fn new(pool: PgPool, options: AdminOptions) -> Self {
        AppState {
            pool,
            settings: SettingsStore::new(options.settings_path.clone()),
            options: Arc::new(options),
        }
    }

    /// Load and resolve the current settings file.
    pub async fn resolved(&self) -> Result<ResolvedSettings, AppError> {
        let settings = self.settings.load().await?;
        Ok(resolve(&settings, &self.options.schema)?)
    }
}
