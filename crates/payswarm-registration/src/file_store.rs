//! JSON File Settings Store
//!
//! Keeps every option in one JSON object on disk. Each grouped write
//! replaces the file through a temporary sibling and a rename, so readers
//! never see half of an update.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{RegistrationError, Result};
use crate::settings::{SettingKey, SettingUpdate, SettingsStore, apply_updates, poisoned};

/// Settings persisted to a JSON file
pub struct FileSettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSettingsStore {
    /// Open (or lazily create) the store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                RegistrationError::Storage(format!("{} is corrupt: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(storage_error(&self.path, &e)),
        }
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| storage_error(parent, &e))?;
        }

        let contents = serde_json::to_string_pretty(values)
            .map_err(|e| RegistrationError::Storage(e.to_string()))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, contents).map_err(|e| storage_error(&staging, &e))?;
        fs::rename(&staging, &self.path).map_err(|e| storage_error(&self.path, &e))
    }
}

fn storage_error(path: &Path, err: &std::io::Error) -> RegistrationError {
    RegistrationError::Storage(format!("{}: {err}", path.display()))
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &SettingKey) -> Result<Option<String>> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        Ok(self.load()?.remove(&key.name()))
    }

    fn set_many(&self, updates: Vec<SettingUpdate>) -> Result<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut values = self.load()?;
        apply_updates(&mut values, updates);
        self.save(&values)
    }

    fn take(&self, key: &SettingKey) -> Result<Option<String>> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut values = self.load()?;
        let taken = values.remove(&key.name());
        if taken.is_some() {
            self.save(&values)?;
        }
        Ok(taken)
    }
}
