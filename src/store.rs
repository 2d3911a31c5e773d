use anyhow::Result;

use crate::compat::{check_compatibility, has_errors};
use crate::data::{ChoiceUpdate, Choices, CompatibilityWarning, Feature};
use crate::storage::Storage;

/// Outcome of a guarded update.
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    Applied(Vec<CompatibilityWarning>),
    /// Not applied: the new snapshot has error-severity findings.
    Blocked(Vec<CompatibilityWarning>),
}

/// Session-owned holder of the current choices. Every mutation is written
/// through to storage.
pub struct ChoiceStore<'a> {
    choices: Choices,
    storage: &'a dyn Storage,
}

impl<'a> ChoiceStore<'a> {
    pub fn open(storage: &'a dyn Storage) -> Self {
        Self {
            choices: storage.load_choices(),
            storage,
        }
    }

    pub fn choices(&self) -> &Choices {
        &self.choices
    }

    pub fn is_complete(&self) -> bool {
        self.choices.is_complete()
    }

    /// Findings the snapshot would have after `update`, without applying it.
    pub fn preview(&self, update: &ChoiceUpdate) -> Result<Vec<CompatibilityWarning>> {
        let candidate = self.choices.with(update.clone())?;
        Ok(check_compatibility(&candidate))
    }

    pub fn update(&mut self, update: ChoiceUpdate) -> Result<()> {
        tracing::debug!(update = ?update, "Updating choice");
        self.choices.apply(update)?;
        self.storage.save_choices(&self.choices)
    }

    /// Apply `update` unless it introduces errors; `force` applies regardless.
    pub fn confirm(&mut self, update: ChoiceUpdate, force: bool) -> Result<Confirmation> {
        let warnings = self.preview(&update)?;
        if has_errors(&warnings) && !force {
            return Ok(Confirmation::Blocked(warnings));
        }
        self.update(update)?;
        Ok(Confirmation::Applied(warnings))
    }

    pub fn set_feature(&mut self, feature: Feature, enabled: bool) -> Result<()> {
        tracing::debug!(feature = %feature, enabled, "Updating feature");
        self.choices.features.set(feature, enabled);
        self.storage.save_choices(&self.choices)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.choices = Choices::default();
        self.storage.clear_choices()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Controller, Firmware};
    use crate::storage::FileStorage;
    use tempfile::TempDir;

    #[test]
    fn test_updates_persist_across_sessions() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        {
            let mut store = ChoiceStore::open(&storage);
            store
                .update(ChoiceUpdate::Controller(Some(Controller::Rp2040)))
                .unwrap();
            store.set_feature(Feature::Oled, true).unwrap();
        }

        let store = ChoiceStore::open(&storage);
        assert_eq!(store.choices().controller, Some(Controller::Rp2040));
        assert!(store.choices().features.oled);
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        let store = ChoiceStore::open(&storage);

        let warnings = store
            .preview(&ChoiceUpdate::Firmware(Some(Firmware::Zmk)))
            .unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(store.choices().firmware.is_none());
    }

    #[test]
    fn test_confirm_blocks_errors_unless_forced() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        let mut store = ChoiceStore::open(&storage);

        let update = ChoiceUpdate::Firmware(Some(Firmware::Kmk));
        let outcome = store.confirm(update.clone(), false).unwrap();
        assert!(matches!(outcome, Confirmation::Blocked(_)));
        assert!(store.choices().firmware.is_none());

        let outcome = store.confirm(update, true).unwrap();
        assert!(matches!(outcome, Confirmation::Applied(w) if w.len() == 1));
        assert_eq!(store.choices().firmware, Some(Firmware::Kmk));
    }

    #[test]
    fn test_confirm_applies_clean_update() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        let mut store = ChoiceStore::open(&storage);

        let outcome = store
            .confirm(ChoiceUpdate::Controller(Some(Controller::EliteC)), false)
            .unwrap();
        assert_eq!(outcome, Confirmation::Applied(Vec::new()));
    }

    #[test]
    fn test_invalid_update_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        let mut store = ChoiceStore::open(&storage);

        assert!(store.update(ChoiceUpdate::KeyCount(0)).is_err());
        assert!(store.preview(&ChoiceUpdate::KeyCount(0)).is_err());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        let mut store = ChoiceStore::open(&storage);

        store.update(ChoiceUpdate::KeyCount(36)).unwrap();
        store.reset().unwrap();
        assert_eq!(store.choices(), &Choices::default());
        assert_eq!(ChoiceStore::open(&storage).choices(), &Choices::default());
    }
}
