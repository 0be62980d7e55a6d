//! Counters and histograms for the extract/normalize/load stages.
//!
//! Recording is a no-op unless a recorder is installed, so library callers and
//! tests pay nothing. The binary installs the Prometheus exporter only when
//! `ETL_METRICS_PORT` is set.

use std::net::SocketAddr;

pub fn init_metrics() {
    let port: u16 = match std::env::var("ETL_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
    {
        Some(p) => p,
        None => return,
    };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            tracing::info!("Prometheus exporter listening on http://{}/metrics", addr);
        }
        Err(e) => {
            tracing::warn!("Prometheus exporter install failed: {}", e);
        }
    }
}

pub mod fetch {
    pub fn page_fetched(records: usize) {
        ::metrics::counter!("etl_fetch_pages_total").increment(1);
        ::metrics::counter!("etl_fetch_records_total").increment(records as u64);
    }

    pub fn request_duration(secs: f64) {
        ::metrics::histogram!("etl_fetch_request_duration_seconds").record(secs);
    }

    pub fn rate_limited() {
        ::metrics::counter!("etl_fetch_rate_limited_total").increment(1);
    }

    pub fn transient_retry() {
        ::metrics::counter!("etl_fetch_transient_retries_total").increment(1);
    }
}

pub mod normalize {
    use crate::types::NormalizeReport;

    pub fn batch_normalized(report: &NormalizeReport) {
        ::metrics::counter!("etl_normalize_products_total").increment(report.products as u64);
        ::metrics::counter!("etl_normalize_sellers_total").increment(report.sellers as u64);
        ::metrics::counter!("etl_normalize_categories_total").increment(report.categories as u64);
        ::metrics::counter!("etl_normalize_product_categories_total")
            .increment(report.product_categories as u64);
        ::metrics::counter!("etl_normalize_dangling_dropped_total")
            .increment(report.associations_dropped_dangling as u64);
    }

    pub fn batch_rejected() {
        ::metrics::counter!("etl_normalize_batches_rejected_total").increment(1);
    }
}

pub mod load {
    pub fn rows_written(table: &'static str, rows: usize) {
        ::metrics::counter!("etl_load_rows_total", "table" => table).increment(rows as u64);
    }
}
