use async_trait::async_trait;

use crate::error::Result;
use crate::types::{LoadSummary, NormalizedTables};

// Ingest-side ports
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// Issue one search request. Transport failures (connect, timeout) are `Err`;
    /// any HTTP status, including 429 and 5xx, comes back as `Ok`.
    async fn get_page(&self, request: &PageRequest) -> Result<HttpResponse>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub query: String,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Retry-After` header value, if the server sent one
    pub retry_after: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Observer for fetch progress. Purely informational.
pub trait ProgressPort: Send + Sync {
    fn on_progress(&self, fetched: usize, target: usize);

    fn on_finish(&self, _fetched: usize, _target: usize) {}
}

/// Progress sink that discards updates
pub struct NoProgress;

impl ProgressPort for NoProgress {
    fn on_progress(&self, _fetched: usize, _target: usize) {}
}

// Load-side port
pub trait TableSinkPort {
    /// Drop and recreate every table, then insert all rows.
    fn replace_tables(&mut self, tables: &NormalizedTables) -> Result<LoadSummary>;
}
