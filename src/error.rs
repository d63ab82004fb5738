/// Error types for table synchronization and language sessions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Missing or invalid endpoint, or an unsupported initial language
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Transport failure or non-success status while downloading the table
    #[error("Fetch error: {0}")]
    Fetch(String),
    /// The operation was abandoned through its cancellation token
    #[error("Operation cancelled")]
    Cancelled,
    /// The cached table exists but could not be read
    #[error("Cache read error: {0}")]
    CacheRead(String),
    /// No cached table at the given path
    #[error("Cached table not found: {0}")]
    CacheMiss(String),
    /// The table text was empty or whitespace-only
    #[error("Empty table input")]
    EmptyInput,
    /// Parsing or applying the table failed; the store was left unchanged
    #[error("Import error: {0}")]
    Import(String),
    /// The store does not know any language
    #[error("No languages available")]
    NoLanguagesAvailable,
    /// The language preference could not be loaded or saved
    #[error("Preference error: {0}")]
    Preferences(String),
}

/// Result type for synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Non-fatal failure to write the downloaded table to the local cache.
///
/// The fetched text is still handed to the caller; this only tells it that
/// the cached fallback is now stale or missing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to cache table at '{path}': {message}")]
pub struct CacheWriteWarning {
    pub path: String,
    pub message: String,
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Fetch(e.to_string())
    }
}

impl From<csv::Error> for SyncError {
    fn from(e: csv::Error) -> Self {
        SyncError::Import(e.to_string())
    }
}
