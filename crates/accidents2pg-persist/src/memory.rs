use std::collections::HashMap;
use std::sync::Mutex;

use accidents2pg_core::NormalizedRecord;
use async_trait::async_trait;
use tracing::debug;

use crate::{validate_ident, PersistError, RecordSink, Result};

/// In-process sink. Records are kept per table in append order.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<HashMap<String, Vec<NormalizedRecord>>>,
    calls: Mutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `append` calls made, including empty ones.
    pub fn calls(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or_default()
    }

    /// Snapshot of everything appended to `table`.
    pub fn rows(&self, table: &str) -> Vec<NormalizedRecord> {
        self.tables
            .lock()
            .ok()
            .and_then(|tables| tables.get(table).cloned())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .ok()
            .and_then(|tables| tables.get(table).map(Vec::len))
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn append(&self, table: &str, records: &[NormalizedRecord]) -> Result<u64> {
        validate_ident(table)?;

        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }

        let mut tables = self
            .tables
            .lock()
            .map_err(|_| PersistError::Query("memory sink lock poisoned".to_string()))?;
        tables
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(records);

        debug!(table, rows = records.len(), "Appended records to memory sink");
        Ok(records.len() as u64)
    }
}
