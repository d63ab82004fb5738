//! Remote translation table synchronization
//!
//! This crate downloads a CSV translation table exported from a spreadsheet,
//! imports it into a translation store with a configurable update mode, and
//! keeps track of the process-wide active language.
//!
//! # Workflow Example
//!
//! ```ignore
//! use sheet_i18n::{
//!     JsonFilePreferences, LanguageSession, MemoryTranslationStore, StartupGate, SyncConfig,
//!     Synchronizer, TableFetcher,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::from_file("sheet-i18n.json".as_ref())?;
//!     let store = Arc::new(MemoryTranslationStore::new());
//!
//!     // 1. Download and import the table
//!     let fetcher = TableFetcher::http(config.fetch_timeout())?;
//!     let synchronizer = Synchronizer::from_config(store.clone(), &config);
//!     synchronizer
//!         .sync_on_startup(&fetcher, &config.source, StartupGate::Immediate, &CancellationToken::new())
//!         .await?;
//!
//!     // 2. Restore the language chosen last time
//!     let prefs = Arc::new(JsonFilePreferences::open(&config.preferences_path)?);
//!     let session = LanguageSession::from_config(store, prefs, &config);
//!     session.initialize_from_preferences()?;
//!
//!     println!("{}", session.translate("MENU/START"));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod mock;
pub mod preferences;
pub mod session;
pub mod store;
pub mod synchronizer;
pub mod table;


// Re-export main types for convenient access
pub use config::{RemoteTableSource, SyncConfig, UpdateMode};
pub use error::{CacheWriteWarning, SyncError, SyncResult};
pub use events::{Observers, SubscriptionId};
pub use fetcher::{FetchedTable, HttpTransport, TableFetcher, TableTransport};
pub use mock::{MockMode, MockTransport};
pub use preferences::{JsonFilePreferences, MemoryPreferences, PreferenceStore};
pub use session::LanguageSession;
pub use store::{ImportReport, MemoryTranslationStore, TableSnapshot, TranslationStore};
pub use synchronizer::{StartupGate, SyncOutcome, Synchronizer};
pub use table::{ParsedTable, TranslationEntry, parse_table};
