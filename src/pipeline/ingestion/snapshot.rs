use chrono::Local;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{EtlError, Result};
use crate::types::RawRecord;

/// Where a raw batch was versioned to
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub path: PathBuf,
    pub record_count: usize,
    pub sha256: String,
}

/// Write the raw batch as a JSON array to `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.json`.
pub fn write_snapshot(dir: &Path, prefix: &str, records: &[RawRecord]) -> Result<SnapshotInfo> {
    fs::create_dir_all(dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{}_{}.json", prefix, timestamp));

    let bytes = serde_json::to_vec_pretty(records)?;
    fs::write(&path, &bytes)?;
    let sha256 = hex::encode(Sha256::digest(&bytes));

    info!(
        "Raw batch of {} records versioned at {}",
        records.len(),
        path.display()
    );
    Ok(SnapshotInfo {
        path,
        record_count: records.len(),
        sha256,
    })
}

/// Load a batch previously written by [`write_snapshot`].
pub fn read_snapshot(path: &Path) -> Result<Vec<RawRecord>> {
    let bytes = fs::read(path)?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    match value {
        serde_json::Value::Array(records) => Ok(records),
        _ => Err(EtlError::Config(format!(
            "snapshot '{}' is not a JSON array of records",
            path.display()
        ))),
    }
}
