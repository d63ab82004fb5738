//! Mock table transport for testing
//!
//! This module provides a deterministic, network-free [`TableTransport`] for
//! exercising the fetcher and synchronizer without a remote spreadsheet.
//!
//! # Example
//!
//! ```ignore
//! use sheet_i18n::mock::{MockMode, MockTransport};
//! use sheet_i18n::TableTransport;
//!
//! #[tokio::test]
//! async fn test_download() {
//!     let mock = MockTransport::new(MockMode::Body("key,en\nHELLO,Hi\n".to_string()));
//!     let body = mock.get("https://example.com/table.csv").await.unwrap();
//!     assert!(body.starts_with(b"key,en"));
//! }
//! ```

use crate::error::{SyncError, SyncResult};
use crate::fetcher::TableTransport;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Mock response modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Always return this body
    Body(String),

    /// Always return these bytes, which need not be valid UTF-8
    Raw(Vec<u8>),

    /// Return the body registered for the requested URL, or a 404-style error
    Routes(HashMap<String, String>),

    /// Simulate a transport failure with this message
    Error(String),

    /// Return an empty body
    NoOp,
}

/// Mock transport that records every URL it is asked for
#[derive(Debug)]
pub struct MockTransport {
    mode: MockMode,
    /// Optional simulated network delay (in milliseconds)
    delay_ms: u64,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new(mode: MockMode) -> Self {
        Self::with_delay(mode, 0)
    }

    /// Create a MockTransport with simulated network delay
    ///
    /// ```ignore
    /// let mock = MockTransport::with_delay(MockMode::NoOp, 50);
    /// // Each request will take ~50ms
    /// ```
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            mode,
            delay_ms,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn respond(&self, url: &str) -> SyncResult<Vec<u8>> {
        match &self.mode {
            MockMode::Body(body) => Ok(body.clone().into_bytes()),
            MockMode::Raw(bytes) => Ok(bytes.clone()),
            MockMode::Routes(routes) => routes
                .get(url)
                .map(|body| body.clone().into_bytes())
                .ok_or_else(|| SyncError::Fetch(format!("HTTP 404 Not Found: {}", url))),
            MockMode::Error(msg) => Err(SyncError::Fetch(msg.clone())),
            MockMode::NoOp => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl TableTransport for MockTransport {
    async fn get(&self, url: &str) -> SyncResult<Vec<u8>> {
        self.requests.lock().push(url.to_string());
        self.apply_delay().await;
        self.respond(url)
    }

    fn transport_name(&self) -> &str {
        "Mock Transport"
    }
}
