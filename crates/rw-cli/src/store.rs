use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rw_core::store::merge_patch;
use rw_core::{ChangedKeys, SettingsStore, StatePatch, StoreError, StoredState};

/// Settings store backed by a JSON file with the extension's storage shape.
/// A missing or empty file reads as an empty store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self) -> Result<StoredState, StoreError> {
        match read_state(&self.path) {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Ok(StoredState::default()),
            Err(e) => Err(StoreError::Backend(e)),
        }
    }

    fn set(&mut self, patch: StatePatch) -> Result<ChangedKeys, StoreError> {
        let mut state = self.get()?;
        let changed = merge_patch(&mut state, patch);
        if !changed.is_empty() {
            write_state(&self.path, &state).map_err(StoreError::Backend)?;
        }
        Ok(changed)
    }
}

pub fn read_state(path: &Path) -> Result<Option<StoredState>, String> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(format!("Failed to read '{}': {}", path.display(), e)),
    };

    if text.trim().is_empty() {
        return Ok(None);
    }

    StoredState::from_json(&text)
        .map(Some)
        .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))
}

pub fn write_state(path: &Path, state: &StoredState) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    let json = state
        .to_json_pretty()
        .map_err(|e| format!("Failed to serialize state: {}", e))?;
    fs::write(path, json + "\n")
        .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
    Ok(())
}
