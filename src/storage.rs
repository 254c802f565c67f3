use crate::config::Settings;
use crate::error::StoreError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn get_base_dir() -> Result<PathBuf, StoreError> {
        let mut path = dirs::home_dir().ok_or(StoreError::NoHomeDir)?;
        path.push(".cursorvibe");
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }
        Ok(path)
    }

    pub fn new() -> Result<Self, StoreError> {
        let path = Self::get_base_dir()?;
        Ok(Self::from_path(path.join("settings.json")))
    }

    pub fn from_path(path: PathBuf) -> Self {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                let _ = fs::create_dir_all(parent);
            }
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads settings, writing defaults first if the file does not exist yet.
    pub fn load(&self) -> Result<Settings, StoreError> {
        if !self.path.exists() {
            let settings = Settings::default();
            self.save(&settings)?;
            return Ok(settings);
        }
        let data = fs::read_to_string(&self.path)?;
        let settings: Settings = serde_json::from_str(&data)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        settings.validate()?;
        let data = serde_json::to_string_pretty(settings)?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &self.path)?;
        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_store_save_load() -> Result<()> {
        let dir = tempdir()?;
        let store = SettingsStore::from_path(dir.path().join("settings.json"));

        let settings = Settings {
            frequency: 0.5,
            distance: 4,
            idle_threshold: 10,
            run_on_startup: true,
        };
        store.save(&settings)?;

        assert_eq!(store.load()?, settings);
        Ok(())
    }

    #[test]
    fn test_store_load_creates_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::from_path(path.clone());

        assert_eq!(store.load()?, Settings::default());
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_store_writes_flat_keys() -> Result<()> {
        let dir = tempdir()?;
        let store = SettingsStore::from_path(dir.path().join("settings.json"));
        store.save(&Settings::default())?;

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path())?)?;
        let obj = raw.as_object().expect("object");
        for key in ["frequency", "distance", "idle_threshold", "run_on_startup"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        Ok(())
    }

    #[test]
    fn test_store_rejects_invalid_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"distance": -4}"#)?;
        let store = SettingsStore::from_path(path);

        assert!(matches!(store.load(), Err(StoreError::Invalid(_))));
        Ok(())
    }

    #[test]
    fn test_store_refuses_to_save_invalid() -> Result<()> {
        let dir = tempdir()?;
        let store = SettingsStore::from_path(dir.path().join("settings.json"));
        let bad = Settings {
            idle_threshold: 0,
            ..Settings::default()
        };
        assert!(store.save(&bad).is_err());
        assert!(!store.path().exists());
        Ok(())
    }
}
