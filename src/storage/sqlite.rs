//! SQLite result store
//!
//! One database file per run, named after the local start time. Every insert
//! commits on its own so a crash loses at most the row in progress.

use super::ResultSink;
use crate::error::{AppError, ErrorContext, Result};
use crate::models::ResultRecord;
use crate::types::OutcomeKind;
use chrono::Local;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};

const CREATE_RESULTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS results (
    MessageIndex INTEGER PRIMARY KEY,
    PublishDateTimeUTC TEXT,
    HighResPublishTime TEXT,
    HighResSubscribeTime TEXT,
    Delay REAL,
    Failed INTEGER DEFAULT 0,
    Status TEXT
)";

const INSERT_RESULT: &str = "INSERT INTO results (
    MessageIndex, PublishDateTimeUTC, HighResPublishTime, HighResSubscribeTime, Delay, Failed, Status
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const SELECT_RESULTS: &str = "SELECT MessageIndex, PublishDateTimeUTC, HighResPublishTime,
    HighResSubscribeTime, Delay, Failed, Status FROM results ORDER BY MessageIndex";

/// File name for a run started now
pub fn results_file_name() -> String {
    format!("mqtt_testeri_results_{}.sqlite", Local::now().format("%Y%m%d_%H%M%S"))
}

/// SQLite-backed [`ResultSink`]
#[derive(Debug)]
pub struct SqliteResultSink {
    conn: Connection,
    path: PathBuf,
}

impl SqliteResultSink {
    /// Create a fresh database for this run inside `dir`
    pub fn create_in(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::storage(e.to_string()))
            .with_context(|| format!("Cannot create results directory {}", dir.display()))?;

        let file_name = results_file_name();
        let mut path = dir.join(&file_name);
        // Two runs within the same second must not share a file
        let mut attempt = 1;
        while path.exists() {
            let stem = file_name.trim_end_matches(".sqlite");
            path = dir.join(format!("{}_{}.sqlite", stem, attempt));
            attempt += 1;
        }

        Self::open(path)
    }

    /// Open (or create) a database at `path` and make sure the table exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute_batch(CREATE_RESULTS_TABLE)?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for SqliteResultSink {
    fn insert(&mut self, record: &ResultRecord) -> Result<()> {
        self.conn.execute(
            INSERT_RESULT,
            params![
                record.message_index,
                record.publish_date_time_utc,
                record.high_res_publish_time,
                record.high_res_subscribe_time,
                record.delay_ms,
                i64::from(record.failed),
                record.status.as_str(),
            ],
        )?;
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<ResultRecord>> {
        query_records(&self.conn)
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Read every row of a finished results database
pub fn load_records(path: &Path) -> Result<Vec<ResultRecord>> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    query_records(&conn)
}

fn query_records(conn: &Connection) -> Result<Vec<ResultRecord>> {
    let mut stmt = conn.prepare(SELECT_RESULTS)?;
    let rows = stmt.query_map([], row_to_record)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ResultRecord> {
    let delay_ms: Option<f64> = row.get(4)?;
    let failed: i64 = row.get(5)?;
    let status: Option<String> = row.get(6)?;

    // Files without a Status value only know success vs not
    let status = match status.as_deref().map(str::parse::<OutcomeKind>) {
        Some(Ok(kind)) => kind,
        _ if failed == 0 && delay_ms.is_some() => OutcomeKind::Success,
        _ => OutcomeKind::Timeout,
    };

    Ok(ResultRecord {
        message_index: row.get(0)?,
        publish_date_time_utc: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        high_res_publish_time: row.get(2)?,
        high_res_subscribe_time: row.get(3)?,
        delay_ms,
        failed: failed != 0,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Outcome;
    use tempfile::TempDir;

    #[test]
    fn test_file_name_format() {
        let name = results_file_name();
        assert!(name.starts_with("mqtt_testeri_results_"));
        assert!(name.ends_with(".sqlite"));
        // mqtt_testeri_results_YYYYmmdd_HHMMSS.sqlite
        assert_eq!(name.len(), "mqtt_testeri_results_".len() + 15 + ".sqlite".len());
    }

    #[test]
    fn test_insert_and_read_back() {
        let dir = TempDir::new().unwrap();
        let mut sink = SqliteResultSink::create_in(dir.path()).unwrap();

        sink.insert(&ResultRecord::from(&Outcome::success(1, "t1".to_string(), 1.0, 1.0125))).unwrap();
        sink.insert(&ResultRecord::from(&Outcome::timeout(2, "t2".to_string()))).unwrap();
        sink.insert(&ResultRecord::from(&Outcome::failed(3, "t3".to_string()))).unwrap();

        let records = load_records(sink.path()).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].status, OutcomeKind::Success);
        assert_eq!(records[0].delay_ms, Some(12.5));
        assert!(!records[0].failed);

        assert_eq!(records[1].status, OutcomeKind::Timeout);
        assert!(records[1].failed);
        assert_eq!(records[1].delay_ms, None);
        assert_eq!(records[1].high_res_publish_time, None);

        assert_eq!(records[2].status, OutcomeKind::Failed);
        assert_eq!(records[2].publish_date_time_utc, "t3");
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let dir = TempDir::new().unwrap();
        let mut sink = SqliteResultSink::create_in(dir.path()).unwrap();
        let record = ResultRecord::from(&Outcome::timeout(1, "t".to_string()));

        sink.insert(&record).unwrap();
        let err = sink.insert(&record).unwrap_err();
        assert_eq!(err.category(), "STORAGE");
    }

    #[test]
    fn test_create_in_makes_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let sink = SqliteResultSink::create_in(&nested).unwrap();

        assert!(sink.path().starts_with(&nested));
        assert!(sink.path().exists());
        assert_eq!(sink.location(), Some(sink.path()));
    }

    #[test]
    fn test_rows_without_status_column_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.sqlite");
        let sink = SqliteResultSink::open(&path).unwrap();
        sink.conn
            .execute(
                "INSERT INTO results (MessageIndex, PublishDateTimeUTC, Delay, Failed) VALUES (1, 't', 3.5, 0), (2, 't', NULL, 1)",
                [],
            )
            .unwrap();

        let records = sink.fetch_all().unwrap();
        assert_eq!(records[0].status, OutcomeKind::Success);
        assert_eq!(records[1].status, OutcomeKind::Timeout);
    }
}
