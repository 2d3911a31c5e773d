use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::Currency;
use crate::data::Choices;
use crate::progress::ProgressRecord;

/// Display preferences that outlive a single command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub currency: Currency,
}

/// Key-value persistence for the session's records. Loads never fail:
/// missing or malformed records fall back to defaults.
pub trait Storage: Send + Sync {
    fn load_choices(&self) -> Choices;
    fn save_choices(&self, choices: &Choices) -> Result<()>;
    fn clear_choices(&self) -> Result<()>;
    fn load_progress(&self) -> Option<ProgressRecord>;
    fn save_progress(&self, record: &ProgressRecord) -> Result<()>;
    fn clear_progress(&self) -> Result<()>;
    fn load_settings(&self) -> Settings;
    fn save_settings(&self, settings: &Settings) -> Result<()>;
}

pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn choices_path(&self) -> PathBuf {
        self.base_dir.join("kb-choices.json")
    }

    fn progress_path(&self) -> PathBuf {
        self.base_dir.join("assembly-progress.json")
    }

    fn settings_path(&self) -> PathBuf {
        self.base_dir.join("kb-settings.json")
    }

    fn read_record<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(
                    path = ?path,
                    error = %e,
                    "Failed to read saved state, using defaults"
                );
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Discarding malformed saved state");
                None
            }
        }
    }

    fn write_record<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", self.base_dir))?;
        let json = serde_json::to_string_pretty(record)?;
        fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    fn remove_record(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", path)),
        }
    }
}

impl Storage for FileStorage {
    fn load_choices(&self) -> Choices {
        self.read_record(&self.choices_path()).unwrap_or_default()
    }

    fn save_choices(&self, choices: &Choices) -> Result<()> {
        self.write_record(&self.choices_path(), choices)
    }

    fn clear_choices(&self) -> Result<()> {
        self.remove_record(&self.choices_path())
    }

    fn load_progress(&self) -> Option<ProgressRecord> {
        self.read_record(&self.progress_path())
    }

    fn save_progress(&self, record: &ProgressRecord) -> Result<()> {
        self.write_record(&self.progress_path(), record)
    }

    fn clear_progress(&self) -> Result<()> {
        self.remove_record(&self.progress_path())
    }

    fn load_settings(&self) -> Settings {
        self.read_record(&self.settings_path()).unwrap_or_default()
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write_record(&self.settings_path(), settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BuildMethod, Firmware};
    use crate::progress::ProgressTracker;
    use tempfile::TempDir;

    #[test]
    fn test_missing_records_use_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("nested"));

        assert_eq!(storage.load_choices(), Choices::default());
        assert!(storage.load_progress().is_none());
        assert_eq!(storage.load_settings().currency, Currency::USD);
    }

    #[test]
    fn test_save_load_choices_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("nested"));

        let choices = Choices {
            build_method: Some(BuildMethod::CustomPcb),
            firmware: Some(Firmware::Qmk),
            ..Choices::default()
        };
        storage.save_choices(&choices).unwrap();

        assert!(temp_dir.path().join("nested/kb-choices.json").exists());
        assert_eq!(storage.load_choices(), choices);
    }

    #[test]
    fn test_malformed_choices_fall_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        fs::write(temp_dir.path().join("kb-choices.json"), "{ not json").unwrap();

        assert_eq!(storage.load_choices(), Choices::default());
    }

    #[test]
    fn test_zero_key_count_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        fs::write(
            temp_dir.path().join("kb-choices.json"),
            r#"{"buildMethod": "handwired", "layout": {"keyCount": 0}}"#,
        )
        .unwrap();

        let loaded = storage.load_choices();
        assert_eq!(loaded, Choices::default());
        assert_eq!(loaded.layout.key_count, 60);
    }

    #[test]
    fn test_malformed_progress_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        fs::write(
            temp_dir.path().join("assembly-progress.json"),
            r#"{"completedSteps": ["a"]}"#,
        )
        .unwrap();

        assert!(storage.load_progress().is_none());
    }

    #[test]
    fn test_progress_roundtrip_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let mut tracker = ProgressTracker::new("hash");
        tracker.mark_complete("prep-tools");
        storage.save_progress(&tracker.to_record()).unwrap();

        let loaded = storage.load_progress().unwrap();
        assert_eq!(loaded, tracker.to_record());

        storage.clear_progress().unwrap();
        assert!(storage.load_progress().is_none());
        // clearing twice is fine
        storage.clear_progress().unwrap();
    }

    #[test]
    fn test_settings_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        storage
            .save_settings(&Settings {
                currency: Currency::NPR,
            })
            .unwrap();
        assert_eq!(storage.load_settings().currency, Currency::NPR);
    }

    #[test]
    fn test_clear_choices() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        storage.save_choices(&Choices::default()).unwrap();
        storage.clear_choices().unwrap();
        assert!(!temp_dir.path().join("kb-choices.json").exists());
    }
}
