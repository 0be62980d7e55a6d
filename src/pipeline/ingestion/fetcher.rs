use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::app::ports::{HttpClientPort, HttpResponse, NoProgress, PageRequest, ProgressPort};
use crate::config::FetcherConfig;
use crate::error::{EtlError, Result};
use crate::types::RawRecord;

/// Success body of the search endpoint. A missing `results` key reads as an empty page.
#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<RawRecord>,
}

/// Paginates the search endpoint, waiting out rate limits and retrying
/// transient failures against a run-wide budget.
pub struct Fetcher {
    client: Arc<dyn HttpClientPort>,
    config: FetcherConfig,
    progress: Arc<dyn ProgressPort>,
}

impl Fetcher {
    pub fn new(client: Arc<dyn HttpClientPort>, config: FetcherConfig) -> Self {
        Self {
            client,
            config,
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressPort>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Lazy page sequence for `query`. Each call to [`Pages::next_page`] issues
    /// requests until one page is obtained, the source is exhausted, or the
    /// retry budget runs out.
    pub fn pages(&self, query: &str, page_size: usize) -> Result<Pages<'_>> {
        if page_size == 0 || page_size > self.config.max_page_size {
            return Err(EtlError::Config(format!(
                "page_size must be between 1 and {}, got {}",
                self.config.max_page_size, page_size
            )));
        }
        Ok(Pages {
            fetcher: self,
            query: query.to_string(),
            page_size,
            offset: 0,
            retries_left: self.config.retry_budget,
            courtesy_due: false,
            exhausted: false,
        })
    }

    /// Collect up to `target_count` raw records for `query`.
    ///
    /// Stops early without error when a page comes back empty. The last page is
    /// always requested at full `page_size`; any excess is truncated.
    #[instrument(skip(self))]
    pub async fn fetch(
        &self,
        query: &str,
        target_count: usize,
        page_size: usize,
    ) -> Result<Vec<RawRecord>> {
        let mut pages = self.pages(query, page_size)?;
        // Grows page by page; the target may be far larger than the source.
        let mut records: Vec<RawRecord> = Vec::with_capacity(target_count.min(page_size));

        while records.len() < target_count {
            match pages.next_page().await? {
                Some(page) => {
                    records.extend(page);
                    self.progress
                        .on_progress(records.len().min(target_count), target_count);
                }
                None => {
                    info!(
                        "Source exhausted at offset {} with {} of {} records",
                        pages.offset(),
                        records.len(),
                        target_count
                    );
                    break;
                }
            }
        }

        records.truncate(target_count);
        self.progress.on_finish(records.len(), target_count);
        info!("Fetched {} records", records.len());
        Ok(records)
    }
}

/// Finite, non-restartable sequence of pages for one fetch.
pub struct Pages<'a> {
    fetcher: &'a Fetcher,
    query: String,
    page_size: usize,
    offset: usize,
    retries_left: u32,
    courtesy_due: bool,
    exhausted: bool,
}

impl Pages<'_> {
    /// Offset of the next page to be requested
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    /// Next non-empty page, `Ok(None)` once the source is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawRecord>>> {
        if self.exhausted {
            return Ok(None);
        }
        let fetcher = self.fetcher;
        let config = &fetcher.config;

        if self.courtesy_due {
            tokio::time::sleep(config.courtesy_delay()).await;
            self.courtesy_due = false;
        }

        let request = PageRequest {
            query: self.query.clone(),
            limit: self.page_size,
            offset: self.offset,
        };

        loop {
            debug!("Requesting offset {} (limit {})", request.offset, request.limit);
            let started = Instant::now();
            let outcome = fetcher.client.get_page(&request).await;
            crate::metrics::fetch::request_duration(started.elapsed().as_secs_f64());

            let cause = match outcome {
                Ok(resp) if resp.is_rate_limited() => {
                    let wait = retry_after(&resp).unwrap_or_else(|| config.rate_limit_default());
                    crate::metrics::fetch::rate_limited();
                    warn!(
                        "Rate limited at offset {}; waiting {}s before retrying",
                        request.offset,
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                Ok(resp) if resp.is_success() => match serde_json::from_slice::<SearchPage>(&resp.body) {
                    Ok(page) => return Ok(self.accept(page.results)),
                    Err(e) => format!("malformed search response: {}", e),
                },
                Ok(resp) => format!("HTTP status {}", resp.status),
                Err(e) => e.to_string(),
            };

            if self.retries_left == 0 {
                self.exhausted = true;
                return Err(EtlError::RetriesExhausted {
                    offset: request.offset,
                    attempts: config.retry_budget,
                    cause,
                });
            }
            self.retries_left -= 1;
            crate::metrics::fetch::transient_retry();
            warn!(
                "Request at offset {} failed ({}); {} retries left",
                request.offset, cause, self.retries_left
            );
            tokio::time::sleep(config.retry_delay()).await;
        }
    }

    fn accept(&mut self, records: Vec<RawRecord>) -> Option<Vec<RawRecord>> {
        if records.is_empty() {
            self.exhausted = true;
            return None;
        }
        crate::metrics::fetch::page_fetched(records.len());
        debug!("Offset {} returned {} records", self.offset, records.len());
        self.offset += self.page_size;
        self.courtesy_due = true;
        Some(records)
    }
}

/// Advisory wait from a 429 response; only whole seconds are understood.
fn retry_after(resp: &HttpResponse) -> Option<Duration> {
    resp.retry_after
        .as_deref()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
