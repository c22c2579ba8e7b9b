//! `masc_store` - Job persistence and run archive for masc
//!
//! This crate provides:
//! - The [`JobStore`] trait the collection job reports progress through
//! - [`DuckJobStore`], a `DuckDB` implementation with versioned migrations
//! - [`RunArchive`], the on-disk layout of collected transcripts and parsed artifacts

use chrono::Utc;
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, instrument};

pub mod archive;
pub mod migrations;
pub mod schema;

pub use archive::RunArchive;
pub use schema::RunStatus;

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] duckdb::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A collection job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub status: RunStatus,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error: Option<String>,
}

/// One host's progress within a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHostRecord {
    pub job_id: String,
    pub host_id: String,
    pub status: RunStatus,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error: Option<String>,
}

/// Where collection progress is recorded.
///
/// `started_at` is stamped on the transition to running and `completed_at`
/// on the transition to a terminal status.
pub trait JobStore: Send + Sync {
    /// Register a pending job and a pending entry per host, in order.
    fn create_job(&self, job_id: &str, host_ids: &[String]) -> Result<(), StoreError>;

    fn set_job_status(
        &self,
        job_id: &str,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError>;

    fn set_host_status(
        &self,
        job_id: &str,
        host_id: &str,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError>;

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Hosts of a job in the order they were registered
    fn list_job_hosts(&self, job_id: &str) -> Result<Vec<JobHostRecord>, StoreError>;

    /// Most recent jobs first
    fn list_jobs(&self, limit: usize) -> Result<Vec<JobRecord>, StoreError>;
}

/// `DuckDB`-backed job store
pub struct DuckJobStore {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

fn parse_status(raw: &str) -> Result<RunStatus, StoreError> {
    raw.parse().map_err(StoreError::QueryError)
}

type JobRow = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn read_job_row(row: &duckdb::Row<'_>) -> duckdb::Result<JobRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn job_from_row(row: JobRow) -> Result<JobRecord, StoreError> {
    let (job_id, status, created_at, started_at, completed_at, error) = row;
    Ok(JobRecord {
        job_id,
        status: parse_status(&status)?,
        created_at,
        started_at,
        completed_at,
        error,
    })
}

const JOB_COLUMNS: &str = "job_id, status, created_at, started_at, completed_at, error";

impl DuckJobStore {
    /// Open or create database at path
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if directory creation, database opening, or
    /// migration execution fails.
    #[instrument]
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!(path = %path.display(), "Opening DuckDB database");

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_string_lossy().to_string(),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open in-memory database (for testing)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if in-memory database setup or migrations fail.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: ":memory:".to_string(),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        migrations::run_all(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    #[must_use]
    pub fn db_path(&self) -> &str {
        &self.db_path
    }
}

impl JobStore for DuckJobStore {
    fn create_job(&self, job_id: &str, host_ids: &[String]) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO jobs (job_id, status, created_at) VALUES (?, ?, ?)",
            duckdb::params![job_id, RunStatus::Pending.as_str(), now],
        )?;
        for (position, host_id) in host_ids.iter().enumerate() {
            conn.execute(
                "INSERT INTO job_hosts (job_id, host_id, position, status) VALUES (?, ?, ?, ?)",
                duckdb::params![
                    job_id,
                    host_id,
                    i64::try_from(position).unwrap_or(i64::MAX),
                    RunStatus::Pending.as_str()
                ],
            )?;
        }

        debug!(job_id, hosts = host_ids.len(), "job created");
        Ok(())
    }

    fn set_job_status(
        &self,
        job_id: &str,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE jobs SET status = ?, \
             started_at = CASE WHEN ? THEN COALESCE(started_at, ?) ELSE started_at END, \
             completed_at = CASE WHEN ? THEN ? ELSE completed_at END, \
             error = COALESCE(?, error) \
             WHERE job_id = ?",
            duckdb::params![
                status.as_str(),
                status == RunStatus::Running,
                now,
                status.is_terminal(),
                now,
                error,
                job_id
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("job {job_id}")));
        }

        debug!(job_id, status = %status, "job status updated");
        Ok(())
    }

    fn set_host_status(
        &self,
        job_id: &str,
        host_id: &str,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE job_hosts SET status = ?, \
             started_at = CASE WHEN ? THEN COALESCE(started_at, ?) ELSE started_at END, \
             completed_at = CASE WHEN ? THEN ? ELSE completed_at END, \
             error = COALESCE(?, error) \
             WHERE job_id = ? AND host_id = ?",
            duckdb::params![
                status.as_str(),
                status == RunStatus::Running,
                now,
                status.is_terminal(),
                now,
                error,
                job_id,
                host_id
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("host {host_id} in job {job_id}")));
        }

        debug!(job_id, host_id, status = %status, "host status updated");
        Ok(())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = ?"),
            [job_id],
            read_job_row,
        );

        match result {
            Ok(row) => job_from_row(row).map(Some),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_job_hosts(&self, job_id: &str) -> Result<Vec<JobHostRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT job_id, host_id, status, started_at, completed_at, error \
             FROM job_hosts WHERE job_id = ? ORDER BY position",
        )?;
        let rows = stmt.query_map([job_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut hosts = Vec::new();
        for row in rows {
            let (job_id, host_id, status, started_at, completed_at, error) = row?;
            hosts.push(JobHostRecord {
                job_id,
                host_id,
                status: parse_status(&status)?,
                started_at,
                completed_at,
                error,
            });
        }
        Ok(hosts)
    }

    fn list_jobs(&self, limit: usize) -> Result<Vec<JobRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC, job_id DESC LIMIT ?"
        ))?;
        let rows = stmt.query_map([i64::try_from(limit).unwrap_or(i64::MAX)], read_job_row)?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(job_from_row(row?)?);
        }
        Ok(jobs)
    }
}
