use crate::app::ports::TableSinkPort;
use crate::error::Result;
use crate::types::{LoadSummary, NormalizedTables};
use tracing::debug;

/// In-memory sink for dry runs and testing. Holds whatever the last load replaced.
#[derive(Debug, Default)]
pub struct InMemorySink {
    tables: Option<NormalizedTables>,
    loads: usize,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> Option<&NormalizedTables> {
        self.tables.as_ref()
    }

    /// Number of completed `replace_tables` calls
    pub fn loads(&self) -> usize {
        self.loads
    }
}

impl TableSinkPort for InMemorySink {
    fn replace_tables(&mut self, tables: &NormalizedTables) -> Result<LoadSummary> {
        self.tables = Some(tables.clone());
        self.loads += 1;
        debug!("Replaced in-memory tables (load #{})", self.loads);
        Ok(LoadSummary::from_tables(tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProductCategory;

    #[test]
    fn keeps_only_the_latest_load() {
        let mut sink = InMemorySink::new();
        let mut tables = NormalizedTables::default();
        tables.product_categories.push(ProductCategory {
            product_id: "P1".into(),
            category_id: "C1".into(),
        });
        sink.replace_tables(&tables).unwrap();
        let summary = sink.replace_tables(&NormalizedTables::default()).unwrap();

        assert_eq!(sink.loads(), 2);
        assert_eq!(summary, LoadSummary::default());
        assert!(sink.tables().unwrap().product_categories.is_empty());
    }
}
