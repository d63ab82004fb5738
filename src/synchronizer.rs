//! Applies fetched or cached tables to a translation store
//!
//! The synchronizer does no parsing of its own: it validates the input,
//! serializes imports, hands the table to the store's import routine and
//! broadcasts a refresh once the store accepted it.

use crate::config::{RemoteTableSource, SyncConfig, UpdateMode};
use crate::error::{CacheWriteWarning, SyncError, SyncResult};
use crate::fetcher::TableFetcher;
use crate::store::{ImportReport, TranslationStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to wait for before the first download
#[derive(Debug)]
pub enum StartupGate {
    /// Start right away
    Immediate,
    /// Give collaborators a fixed head start
    Delay(Duration),
    /// Wait until the owner of the store reports it is ready
    Ready(oneshot::Receiver<()>),
}

/// Result of a fetch followed by an import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub report: ImportReport,
    pub cache_warning: Option<CacheWriteWarning>,
}

pub struct Synchronizer {
    store: Arc<dyn TranslationStore>,
    prefix: String,
    mode: UpdateMode,
    // Held across import and broadcast.
    import_lock: Mutex<()>,
}

impl Synchronizer {
    /// Synchronizer with no key prefix, importing in `Replace` mode
    pub fn new(store: Arc<dyn TranslationStore>) -> Self {
        Self {
            store,
            prefix: String::new(),
            mode: UpdateMode::default(),
            import_lock: Mutex::new(()),
        }
    }

    pub fn from_config(store: Arc<dyn TranslationStore>, config: &SyncConfig) -> Self {
        Self::new(store)
            .with_mode(config.update_mode)
            .with_prefix(&config.prefix)
    }

    /// Mode used by [`sync`](Self::sync), [`sync_from_cache`](Self::sync_from_cache)
    /// and [`sync_on_startup`](Self::sync_on_startup)
    pub fn with_mode(mut self, mode: UpdateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<dyn TranslationStore> {
        &self.store
    }

    /// Import `csv` into the store, then broadcast a refresh
    ///
    /// # Errors
    ///
    /// * `SyncError::EmptyInput` - `csv` is empty or whitespace-only
    /// * `SyncError::Import` - the store rejected the table
    ///
    /// On error the store is unchanged and no refresh is broadcast.
    pub async fn import_csv(
        &self,
        csv: &str,
        mode: UpdateMode,
        separator: char,
    ) -> SyncResult<ImportReport> {
        if csv.trim().is_empty() {
            warn!("Empty table data");
            return Err(SyncError::EmptyInput);
        }

        let _guard = self.import_lock.lock().await;
        let report = self
            .store
            .import_csv(&self.prefix, csv, mode, separator)
            .map_err(|e| {
                let error = match e {
                    SyncError::Import(msg) => SyncError::Import(msg),
                    other => SyncError::Import(other.to_string()),
                };
                warn!("Failed to import table: {}", error);
                error
            })?;
        self.store.refresh_all();

        info!(
            "Table imported ({}): {} added, {} updated, {} removed",
            report.mode, report.added, report.updated, report.removed
        );
        Ok(report)
    }

    /// Fetch the table once and import it
    ///
    /// A failed fetch leaves the store as it was; falling back to the cache
    /// is left to the caller.
    pub async fn sync(
        &self,
        fetcher: &TableFetcher,
        source: &RemoteTableSource,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncOutcome> {
        let fetched = fetcher.fetch(source, cancel).await?;
        let report = self
            .import_csv(&fetched.csv, self.mode, source.separator)
            .await?;
        Ok(SyncOutcome {
            report,
            cache_warning: fetched.cache_warning,
        })
    }

    /// Import the table saved by the last successful fetch
    pub async fn sync_from_cache(
        &self,
        fetcher: &TableFetcher,
        source: &RemoteTableSource,
    ) -> SyncResult<ImportReport> {
        let csv = fetcher.load_cached(source).await?;
        self.import_csv(&csv, self.mode, source.separator).await
    }

    /// Wait for `gate`, then [`sync`](Self::sync)
    ///
    /// # Errors
    ///
    /// Besides the errors of `sync`: `SyncError::Cancelled` if `cancel` fires
    /// while waiting, and `SyncError::Configuration` if a readiness sender is
    /// dropped without signalling.
    pub async fn sync_on_startup(
        &self,
        fetcher: &TableFetcher,
        source: &RemoteTableSource,
        gate: StartupGate,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncOutcome> {
        match gate {
            StartupGate::Immediate => {}
            StartupGate::Delay(delay) => {
                debug!("Waiting {:?} before first table download", delay);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            StartupGate::Ready(ready) => {
                debug!("Waiting for translation store readiness");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                    signal = ready => signal.map_err(|_| {
                        SyncError::Configuration(
                            "Readiness signal dropped before the store was ready".to_string(),
                        )
                    })?,
                }
            }
        }

        self.sync(fetcher, source, cancel).await
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("prefix", &self.prefix)
            .field("mode", &self.mode)
            .finish()
    }
}
