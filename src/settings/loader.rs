//! Load and save the JSON settings file. The file is rewritten wholesale on save.

use crate::error::ConfigError;
use crate::settings::{validate, AdminSettings};
use std::path::{Path, PathBuf};

pub fn parse_settings(json: &str) -> Result<AdminSettings, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

pub async fn load_settings(path: &Path) -> Result<AdminSettings, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse_settings(&raw)
}

/// Validate, then write through a sibling temp file and rename so readers never see a partial document.
pub async fn save_settings(path: &Path, settings: &AdminSettings) -> Result<(), ConfigError> {
    validate(settings)?;
    let body = serde_json::to_string_pretty(settings).map_err(|e| ConfigError::Save(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .map_err(|e| ConfigError::Save(format!("{}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| ConfigError::Save(format!("{}: {}", path.display(), e)))?;
    tracing::info!(path = %path.display(), models = settings.models.len(), "settings saved");
    Ok(())
}

/// Settings file handle shared by request handlers. Every call reads the file again.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SettingsStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<AdminSettings, ConfigError> {
        load_settings(&self.path).await
    }

    pub async fn save(&self, settings: &AdminSettings) -> Result<(), ConfigError> {
        save_settings(&self.path, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        let settings = parse_settings(
            r#"{ "models": [{ "name": "User", "canDelete": false, "fields": [{ "name": "id", "type": "Int" }] }] }"#,
        )
        .unwrap();
        store.save(&settings).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, settings);
        assert!(!loaded.models[0].can_delete);
    }

    #[tokio::test]
    async fn save_rejects_invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        let settings = parse_settings(r#"{ "models": [{ "name": "User", "fields": [] }] }"#).unwrap();
        assert!(store.save(&settings).await.is_err());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn missing_file_is_load_error() {
        let store = SettingsStore::new("/nonexistent/settings.json");
        assert!(matches!(store.load().await, Err(ConfigError::Load(_))));
    }
}
