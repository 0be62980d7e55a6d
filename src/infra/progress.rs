use crate::app::ports::ProgressPort;
use tracing::info;

/// Reports fetch progress through the log.
pub struct TracingProgress {
    label: String,
}

impl TracingProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl ProgressPort for TracingProgress {
    fn on_progress(&self, fetched: usize, target: usize) {
        let pct = if target == 0 {
            100.0
        } else {
            fetched as f64 * 100.0 / target as f64
        };
        info!("{}: {}/{} records ({:.0}%)", self.label, fetched, target, pct);
    }

    fn on_finish(&self, fetched: usize, target: usize) {
        if fetched < target {
            info!(
                "{}: finished early with {} of {} requested records",
                self.label, fetched, target
            );
        } else {
            info!("{}: done, {} records", self.label, fetched);
        }
    }
}
