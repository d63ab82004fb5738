//! Remote table download and local cache
//!
//! [`TableFetcher`] resolves the endpoint of a [`RemoteTableSource`], performs
//! exactly one GET through a [`TableTransport`], and writes the body to the
//! source's cache file byte for byte. There is no retry: a failed fetch is
//! reported to the caller, which may fall back to [`TableFetcher::load_cached`].
//!
//! Bodies are decoded as UTF-8 only after caching. A leading BOM is kept in
//! the text (the table reader strips it); invalid sequences are replaced with
//! U+FFFD and logged, and the cache still holds the original bytes.
//!
//! # Example
//!
//! ```ignore
//! use sheet_i18n::{RemoteTableSource, TableFetcher};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = TableFetcher::http(std::time::Duration::from_secs(30))?;
//!     let source = RemoteTableSource::new("1AbC", "0");
//!
//!     let table = match fetcher.fetch(&source, &CancellationToken::new()).await {
//!         Ok(fetched) => fetched.csv,
//!         Err(_) => fetcher.load_cached(&source).await?,
//!     };
//!     println!("{} bytes", table.len());
//!     Ok(())
//! }
//! ```

use crate::config::RemoteTableSource;
use crate::error::{CacheWriteWarning, SyncError, SyncResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Something that can GET a URL and return its raw body
///
/// Implementations perform a single attempt and map transport failures and
/// non-success statuses to `SyncError::Fetch`.
#[async_trait]
pub trait TableTransport: Send + Sync {
    async fn get(&self, url: &str) -> SyncResult<Vec<u8>>;

    /// Name used in log lines
    fn transport_name(&self) -> &str;
}

/// `reqwest`-backed transport with an explicit request timeout
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Longest error body quoted in a `Fetch` error message
    const MAX_ERROR_BODY_CHARS: usize = 200;

    pub fn new(timeout: Duration) -> SyncResult<Self> {
        if timeout.is_zero() {
            return Err(SyncError::Configuration(
                "Fetch timeout must be greater than zero".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl TableTransport for HttpTransport {
    async fn get(&self, url: &str) -> SyncResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(Self::MAX_ERROR_BODY_CHARS).collect();
            return Err(SyncError::Fetch(format!("HTTP {}: {}", status, body.trim())));
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn transport_name(&self) -> &str {
        "HTTP"
    }
}

/// A downloaded table and the outcome of caching it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTable {
    /// The resolved endpoint the table came from
    pub url: String,
    pub csv: String,
    /// Set when the table could not be written to the cache file
    pub cache_warning: Option<CacheWriteWarning>,
}

pub struct TableFetcher {
    transport: Arc<dyn TableTransport>,
}

impl TableFetcher {
    pub fn new(transport: Arc<dyn TableTransport>) -> Self {
        Self { transport }
    }

    /// Fetcher over [`HttpTransport`] with the given request timeout
    pub fn http(timeout: Duration) -> SyncResult<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(timeout)?)))
    }

    /// Download the table once and overwrite the local cache with it
    ///
    /// # Errors
    ///
    /// * `SyncError::Configuration` - the endpoint does not resolve
    /// * `SyncError::Fetch` - transport failure or non-success status
    /// * `SyncError::Cancelled` - `cancel` fired before the response arrived;
    ///   the cache is not touched
    ///
    /// A cache write failure is not an error; see [`FetchedTable::cache_warning`].
    pub async fn fetch(
        &self,
        source: &RemoteTableSource,
        cancel: &CancellationToken,
    ) -> SyncResult<FetchedTable> {
        let url = source.resolve_endpoint()?;
        info!(
            "Starting table download from: {} ({})",
            url,
            self.transport.transport_name()
        );

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Table download cancelled: {}", url);
                return Err(SyncError::Cancelled);
            }
            result = self.transport.get(&url) => result.inspect_err(|e| {
                warn!("Error downloading table: {}", e);
            })?,
        };

        let cache_warning = match write_cache(&source.cache_path, &body).await {
            Ok(()) => {
                debug!("Table saved to: {}", source.cache_path.display());
                None
            }
            Err(warning) => {
                warn!("{}", warning);
                Some(warning)
            }
        };

        let csv = decode_table(body, &url);
        Ok(FetchedTable {
            url,
            csv,
            cache_warning,
        })
    }

    /// Read the table saved by the last successful [`fetch`](Self::fetch)
    ///
    /// # Errors
    ///
    /// * `SyncError::CacheMiss` - no cache file at the source's path
    /// * `SyncError::CacheRead` - the file exists but cannot be read
    pub async fn load_cached(&self, source: &RemoteTableSource) -> SyncResult<String> {
        let path = &source.cache_path;
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                debug!("Loaded cached table from: {}", path.display());
                Ok(decode_table(bytes, &path.display().to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Local table not found at: {}", path.display());
                Err(SyncError::CacheMiss(path.display().to_string()))
            }
            Err(e) => {
                warn!("Error reading local table: {}", e);
                Err(SyncError::CacheRead(format!("{}: {}", path.display(), e)))
            }
        }
    }
}

impl std::fmt::Debug for TableFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableFetcher")
            .field("transport", &self.transport.transport_name())
            .finish()
    }
}

/// UTF-8 text of a table body, lossy when the body is not valid UTF-8
fn decode_table(bytes: Vec<u8>, origin: &str) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                "Table from {} is not valid UTF-8 (at byte {}), replacing invalid sequences",
                origin,
                e.utf8_error().valid_up_to()
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

async fn write_cache(path: &Path, body: &[u8]) -> Result<(), CacheWriteWarning> {
    let warning = |e: std::io::Error| CacheWriteWarning {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(warning)?;
    }
    tokio::fs::write(path, body).await.map_err(warning)
}
