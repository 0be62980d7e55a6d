// Pipeline ingestion: paginated fetching and raw batch snapshots

pub mod fetcher;
pub mod snapshot;
