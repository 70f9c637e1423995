//! Result persistence
//!
//! Outcomes are written by a single consumer through the [`ResultSink`]
//! trait. The SQLite sink is the durable store; the in-memory sink backs
//! tests.

pub mod memory;
pub mod sqlite;
pub mod worker;

pub use memory::MemoryResultSink;
pub use sqlite::{load_records, SqliteResultSink};
pub use worker::{PersistCommand, PersistenceWorker, ProgressMode, WorkerReport};

use crate::error::Result;
use crate::models::ResultRecord;
use std::path::Path;

/// Append-only store of per-message results, keyed by message index
pub trait ResultSink: Send {
    /// Append one row; inserting an index twice is an error
    fn insert(&mut self, record: &ResultRecord) -> Result<()>;

    /// Every stored row, ordered by message index
    fn fetch_all(&self) -> Result<Vec<ResultRecord>>;

    /// Backing file, if the sink has one
    fn location(&self) -> Option<&Path> {
        None
    }
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn insert(&mut self, record: &ResultRecord) -> Result<()> {
        (**self).insert(record)
    }

    fn fetch_all(&self) -> Result<Vec<ResultRecord>> {
        (**self).fetch_all()
    }

    fn location(&self) -> Option<&Path> {
        (**self).location()
    }
}
