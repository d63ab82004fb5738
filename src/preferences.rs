use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// String key-value persistence that survives process restarts
///
/// `set` may only stage the value; it is durable after `save`.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn save(&self) -> SyncResult<()>;
}

/// Volatile preferences, for tests and hosts that persist elsewhere
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
    }

    fn save(&self) -> SyncResult<()> {
        Ok(())
    }
}

/// Preferences stored as a flat JSON object on disk
///
/// The file looks like:
/// ```json
/// {
///     "SelectedLanguage": "Spanish"
/// }
/// ```
/// Values that are not strings are ignored on load.
#[derive(Debug)]
pub struct JsonFilePreferences {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl JsonFilePreferences {
    /// Open the preference file, starting empty if it does not exist yet
    ///
    /// # Errors
    /// - File exists but cannot be read
    /// - Invalid JSON, or the root is not an object
    pub fn open(path: &Path) -> SyncResult<Self> {
        let values = if path.exists() {
            load_preferences_from_file(path)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
    }

    fn save(&self) -> SyncResult<()> {
        let object: Map<String, Value> = self
            .values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let content = serde_json::to_string_pretty(&Value::Object(object))
            .map_err(|e| SyncError::Preferences(format!("Failed to encode preferences: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                SyncError::Preferences(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        fs::write(&self.path, content).map_err(|e| {
            SyncError::Preferences(format!(
                "Failed to write preferences '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}

fn load_preferences_from_file(path: &Path) -> SyncResult<HashMap<String, String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        SyncError::Preferences(format!("Failed to read file '{}': {}", path.display(), e))
    })?;

    let json: Value = serde_json::from_str(&content).map_err(|e| {
        SyncError::Preferences(format!(
            "Failed to parse JSON from '{}': {}",
            path.display(),
            e
        ))
    })?;

    let obj = json.as_object().ok_or_else(|| {
        SyncError::Preferences(format!(
            "Invalid JSON in '{}': root must be an object",
            path.display()
        ))
    })?;

    let mut values = HashMap::new();
    for (key, value) in obj {
        if let Some(text) = value.as_str() {
            values.insert(key.clone(), text.to_string());
        } else {
            warn!("Preference '{}' is not a string, skipping", key);
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_preferences() {
        let prefs = MemoryPreferences::new();
        assert_eq!(prefs.get("SelectedLanguage"), None);
        prefs.set("SelectedLanguage", "French");
        assert_eq!(prefs.get("SelectedLanguage"), Some("French".to_string()));
        assert!(prefs.save().is_ok());
    }

    #[test]
    fn test_json_preferences_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let prefs = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(prefs.get("SelectedLanguage"), None);
        prefs.set("SelectedLanguage", "Spanish");
        prefs.save().unwrap();

        let reopened = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(reopened.get("SelectedLanguage"), Some("Spanish".to_string()));
    }

    #[test]
    fn test_json_preferences_unsaved_value_is_not_durable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let prefs = JsonFilePreferences::open(&path).unwrap();
        prefs.set("SelectedLanguage", "Spanish");

        let reopened = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(reopened.get("SelectedLanguage"), None);
    }

    #[test]
    fn test_json_preferences_skip_non_string_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, r#"{"SelectedLanguage": "German", "volume": 3}"#).unwrap();

        let prefs = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(prefs.get("SelectedLanguage"), Some("German".to_string()));
        assert_eq!(prefs.get("volume"), None);
    }

    #[test]
    fn test_json_preferences_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "[1, 2]").unwrap();

        match JsonFilePreferences::open(&path) {
            Err(SyncError::Preferences(msg)) => assert!(msg.contains("root must be an object")),
            other => panic!("Expected Preferences error, got {:?}", other),
        }
    }
}
