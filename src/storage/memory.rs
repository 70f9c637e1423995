//! In-memory result store

use super::ResultSink;
use crate::error::{AppError, Result};
use crate::models::ResultRecord;
use std::collections::{BTreeMap, HashSet};

/// [`ResultSink`] that keeps rows in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryResultSink {
    rows: BTreeMap<u32, ResultRecord>,
    reject: HashSet<u32>,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that refuses inserts for the given indices
    pub fn rejecting(indices: impl IntoIterator<Item = u32>) -> Self {
        Self {
            rows: BTreeMap::new(),
            reject: indices.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&ResultRecord> {
        self.rows.get(&index)
    }
}

impl ResultSink for MemoryResultSink {
    fn insert(&mut self, record: &ResultRecord) -> Result<()> {
        if self.reject.contains(&record.message_index) {
            return Err(AppError::storage(format!(
                "insert rejected for MessageIndex {}",
                record.message_index
            )));
        }
        if self.rows.contains_key(&record.message_index) {
            return Err(AppError::storage(format!(
                "UNIQUE constraint failed: results.MessageIndex ({})",
                record.message_index
            )));
        }
        self.rows.insert(record.message_index, record.clone());
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<ResultRecord>> {
        Ok(self.rows.values().cloned().collect())
    }
}
