//! Configuration for table synchronization and the language session
//!
//! Everything here is immutable once loaded. A [`SyncConfig`] is usually read
//! from a JSON file:
//!
//! ```json
//! {
//!     "source": {
//!         "table_id": "1AbC...",
//!         "grid_id": "0",
//!         "cache_path": "data/localization.csv"
//!     },
//!     "update_mode": "merge",
//!     "default_language": "English"
//! }
//! ```
//!
//! Missing fields fall back to the defaults below.

use crate::error::{SyncError, SyncResult};
use crate::fetcher::HttpTransport;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Google Sheets CSV export URL with `${id}` and `${gid}` placeholders
pub const DEFAULT_ENDPOINT_TEMPLATE: &str =
    "https://docs.google.com/spreadsheets/u/1/d/${id}/export?format=csv&id=${id}&gid=${gid}";

const TABLE_ID_PLACEHOLDER: &str = "${id}";
const GRID_ID_PLACEHOLDER: &str = "${gid}";

/// Environment variable overriding [`RemoteTableSource::table_id`]
pub const TABLE_ID_ENV: &str = "SHEET_I18N_TABLE_ID";
/// Environment variable overriding [`RemoteTableSource::grid_id`]
pub const GRID_ID_ENV: &str = "SHEET_I18N_GRID_ID";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{[^}]*\}").expect("placeholder pattern is valid"));

/// How an imported table combines with the entries already in the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Entries become exactly the imported table
    #[default]
    Replace,
    /// Insert keys the store does not have yet, never overwrite
    #[serde(alias = "add")]
    AddOnly,
    /// Overwrite overlapping keys, keep keys missing from the table
    Merge,
}

impl std::fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateMode::Replace => write!(f, "replace"),
            UpdateMode::AddOnly => write!(f, "add_only"),
            UpdateMode::Merge => write!(f, "merge"),
        }
    }
}

/// Where the translation table lives, remotely and in the local cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTableSource {
    #[serde(default = "default_endpoint_template")]
    pub endpoint_template: String,
    /// Spreadsheet identifier substituted for `${id}`
    #[serde(default)]
    pub table_id: String,
    /// Sheet (grid) identifier substituted for `${gid}`
    #[serde(default)]
    pub grid_id: String,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_separator")]
    pub separator: char,
}

impl RemoteTableSource {
    /// Source for a spreadsheet id and grid id using the default export template
    pub fn new(table_id: impl Into<String>, grid_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            grid_id: grid_id.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint_template(mut self, template: impl Into<String>) -> Self {
        self.endpoint_template = template.into();
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Substitute the identifiers into the endpoint template
    ///
    /// # Errors
    ///
    /// `SyncError::Configuration` when the result is empty, when a
    /// placeholder the template uses has an empty value, or when any
    /// `${...}` placeholder is left unresolved.
    pub fn resolve_endpoint(&self) -> SyncResult<String> {
        if self.endpoint_template.contains(TABLE_ID_PLACEHOLDER) && self.table_id.trim().is_empty()
        {
            return Err(SyncError::Configuration(
                "Table id is required by the endpoint template".to_string(),
            ));
        }
        if self.endpoint_template.contains(GRID_ID_PLACEHOLDER) && self.grid_id.trim().is_empty() {
            return Err(SyncError::Configuration(
                "Grid id is required by the endpoint template".to_string(),
            ));
        }

        let resolved = self
            .endpoint_template
            .replace(TABLE_ID_PLACEHOLDER, self.table_id.trim())
            .replace(GRID_ID_PLACEHOLDER, self.grid_id.trim());
        let resolved = resolved.trim();

        if resolved.is_empty() {
            return Err(SyncError::Configuration(
                "Endpoint URL is not specified".to_string(),
            ));
        }
        if let Some(m) = PLACEHOLDER_RE.find(resolved) {
            return Err(SyncError::Configuration(format!(
                "Unresolved placeholder {} in endpoint",
                m.as_str()
            )));
        }

        Ok(resolved.to_string())
    }
}

impl Default for RemoteTableSource {
    fn default() -> Self {
        Self {
            endpoint_template: default_endpoint_template(),
            table_id: String::new(),
            grid_id: String::new(),
            cache_path: default_cache_path(),
            separator: default_separator(),
        }
    }
}

/// Top-level configuration for the synchronizer, fetcher and session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub source: RemoteTableSource,
    #[serde(default)]
    pub update_mode: UpdateMode,
    /// Category prefix for imported term keys; empty means none
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_language")]
    pub default_language: String,
    /// Key under which the selected language is persisted
    #[serde(default = "default_preference_key")]
    pub preference_key: String,
    /// Restore the persisted language at startup
    #[serde(default = "default_true")]
    pub load_persisted_language: bool,
    #[serde(default = "default_preferences_path")]
    pub preferences_path: PathBuf,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Delay before the first fetch when no readiness signal is wired in
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
}

impl SyncConfig {
    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> SyncResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| SyncError::Configuration(format!("Invalid configuration: {}", e)))
    }

    /// Load a configuration file, then apply environment overrides
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Configuration(format!(
                "Failed to read configuration '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut config = Self::from_json(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override the table and grid ids from `SHEET_I18N_TABLE_ID` / `SHEET_I18N_GRID_ID`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var(TABLE_ID_ENV) {
            self.source.table_id = id;
        }
        if let Ok(gid) = std::env::var(GRID_ID_ENV) {
            self.source.grid_id = gid;
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: RemoteTableSource::default(),
            update_mode: UpdateMode::default(),
            prefix: String::new(),
            default_language: default_language(),
            preference_key: default_preference_key(),
            load_persisted_language: true,
            preferences_path: default_preferences_path(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            startup_delay_ms: default_startup_delay_ms(),
        }
    }
}

fn default_endpoint_template() -> String {
    DEFAULT_ENDPOINT_TEMPLATE.to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("localization.csv")
}

fn default_separator() -> char {
    ','
}

fn default_language() -> String {
    "English".to_string()
}

fn default_preference_key() -> String {
    "SelectedLanguage".to_string()
}

fn default_true() -> bool {
    true
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from("preferences.json")
}

fn default_fetch_timeout_secs() -> u64 {
    HttpTransport::DEFAULT_TIMEOUT.as_secs()
}

fn default_startup_delay_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== Endpoint Resolution Tests ==========

    #[test]
    fn test_resolve_default_template() {
        let source = RemoteTableSource::new("T1", "G1");
        assert_eq!(
            source.resolve_endpoint().unwrap(),
            "https://docs.google.com/spreadsheets/u/1/d/T1/export?format=csv&id=T1&gid=G1"
        );
    }

    #[test]
    fn test_resolve_trims_trailing_line_break() {
        let source = RemoteTableSource::new("T1", "G1")
            .with_endpoint_template("https://example.com/${id}/${gid}.csv\r\n");
        assert_eq!(
            source.resolve_endpoint().unwrap(),
            "https://example.com/T1/G1.csv"
        );
    }

    #[test]
    fn test_resolve_empty_template() {
        let source = RemoteTableSource::new("T1", "G1").with_endpoint_template("   ");
        match source.resolve_endpoint() {
            Err(SyncError::Configuration(msg)) => assert!(msg.contains("not specified")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_missing_table_id() {
        let source = RemoteTableSource::new("", "G1");
        match source.resolve_endpoint() {
            Err(SyncError::Configuration(msg)) => assert!(msg.contains("Table id")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_unknown_placeholder() {
        let source = RemoteTableSource::new("T1", "G1")
            .with_endpoint_template("https://example.com/${id}?sheet=${sheet}");
        match source.resolve_endpoint() {
            Err(SyncError::Configuration(msg)) => assert!(msg.contains("${sheet}")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_template_without_placeholders() {
        let source = RemoteTableSource::default().with_endpoint_template("http://127.0.0.1/t.csv");
        assert_eq!(source.resolve_endpoint().unwrap(), "http://127.0.0.1/t.csv");
    }

    // ========== Config Loading Tests ==========

    #[test]
    fn test_config_defaults_from_empty_object() {
        let config = SyncConfig::from_json("{}").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.update_mode, UpdateMode::Replace);
        assert_eq!(config.source.separator, ',');
        assert_eq!(config.default_language, "English");
        assert_eq!(config.preference_key, "SelectedLanguage");
        assert_eq!(config.fetch_timeout(), HttpTransport::DEFAULT_TIMEOUT);
        assert_eq!(config.startup_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_config_full() {
        let config = SyncConfig::from_json(
            r#"{
                "source": {"table_id": "abc", "grid_id": "7", "separator": ";"},
                "update_mode": "add",
                "prefix": "Menu",
                "default_language": "Spanish",
                "load_persisted_language": false
            }"#,
        )
        .unwrap();
        assert_eq!(config.source.table_id, "abc");
        assert_eq!(config.source.separator, ';');
        assert_eq!(config.update_mode, UpdateMode::AddOnly);
        assert_eq!(config.prefix, "Menu");
        assert!(!config.load_persisted_language);
    }

    #[test]
    fn test_config_invalid_json() {
        assert!(matches!(
            SyncConfig::from_json("{not json"),
            Err(SyncError::Configuration(_))
        ));
    }

    #[test]
    fn test_config_missing_file() {
        let result = SyncConfig::from_file(Path::new("/nonexistent/sheet-i18n.json"));
        match result {
            Err(SyncError::Configuration(msg)) => assert!(msg.contains("Failed to read")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_update_mode_display() {
        assert_eq!(UpdateMode::Merge.to_string(), "merge");
        assert_eq!(UpdateMode::AddOnly.to_string(), "add_only");
    }
}
