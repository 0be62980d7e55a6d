use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::app::ports::{HttpClientPort, ProgressPort, TableSinkPort};
use crate::config::{Config, SnapshotConfig};
use crate::error::{EtlError, Result};
use crate::pipeline::ingestion::fetcher::Fetcher;
use crate::pipeline::ingestion::snapshot::{self, SnapshotInfo};
use crate::pipeline::processing::normalize::{Normalizer, RelationalNormalizer};
use crate::types::{LoadSummary, NormalizeReport, RawRecord};

/// What to extract in one run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub query: String,
    pub target_count: usize,
    pub page_size: usize,
    /// Version the raw batch to disk before transforming it
    pub snapshot: bool,
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub fetched: usize,
    pub snapshot: Option<SnapshotInfo>,
    pub report: NormalizeReport,
    pub load: LoadSummary,
}

/// Fetch, optionally snapshot, normalize, load. Nothing reaches the sink unless
/// fetching and normalization both succeed.
pub struct Pipeline {
    fetcher: Fetcher,
    normalizer: RelationalNormalizer,
    snapshot: SnapshotConfig,
}

impl Pipeline {
    pub fn new(fetcher: Fetcher, normalizer: RelationalNormalizer, snapshot: SnapshotConfig) -> Self {
        Self {
            fetcher,
            normalizer,
            snapshot,
        }
    }

    pub fn from_config(
        config: &Config,
        client: Arc<dyn HttpClientPort>,
        progress: Arc<dyn ProgressPort>,
    ) -> Self {
        let fetcher = Fetcher::new(client, config.fetcher.clone()).with_progress(progress);
        Self::new(
            fetcher,
            RelationalNormalizer::new(config.normalizer.strict_mode),
            config.snapshot.clone(),
        )
    }

    pub fn normalizer(&self) -> &RelationalNormalizer {
        &self.normalizer
    }

    /// Fetch the raw batch and, if requested and enabled, write its snapshot.
    pub async fn extract(
        &self,
        request: &RunRequest,
    ) -> Result<(Vec<RawRecord>, Option<SnapshotInfo>)> {
        let records = self
            .fetcher
            .fetch(&request.query, request.target_count, request.page_size)
            .await?;

        let snapshot = if request.snapshot && self.snapshot.enabled {
            Some(snapshot::write_snapshot(
                Path::new(&self.snapshot.dir),
                &self.snapshot.prefix,
                &records,
            )?)
        } else {
            None
        };
        Ok((records, snapshot))
    }

    /// Normalize a raw batch and replace the sink's tables with the result.
    pub fn transform_and_load(
        &self,
        records: &[RawRecord],
        sink: &mut dyn TableSinkPort,
    ) -> Result<(NormalizeReport, LoadSummary)> {
        let normalized = match self.normalizer.normalize(records) {
            Ok(normalized) => normalized,
            Err(e) => {
                crate::metrics::normalize::batch_rejected();
                error!("Normalization rejected the batch: {}", e);
                return Err(EtlError::Integrity(e));
            }
        };
        crate::metrics::normalize::batch_normalized(&normalized.report);

        let load = sink.replace_tables(&normalized.tables)?;
        Ok((normalized.report, load))
    }

    pub async fn run(
        &self,
        request: &RunRequest,
        sink: &mut dyn TableSinkPort,
    ) -> Result<PipelineResult> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", run_id = %run_id, query = %request.query);

        async move {
            info!(
                "Starting run: target {} records, page size {}",
                request.target_count, request.page_size
            );
            let (records, snapshot) = self.extract(request).await?;
            let (report, load) = self.transform_and_load(&records, sink)?;
            info!("Run finished");

            Ok::<_, EtlError>(PipelineResult {
                run_id,
                fetched: records.len(),
                snapshot,
                report,
                load,
            })
        }
        .instrument(span)
        .await
    }
}
