//! Replica and binary-log primary role reports.
//!
//! An empty report is a valid answer: the server simply does not hold that
//! role. Column names changed between server versions (`Source`/`Replica`
//! versus `Master`/`Slave`), so each field accepts either spelling.

use crate::tabular::{Row, parse_rows};
use serde::{Deserialize, Serialize};

/// Replica role as reported by `SHOW REPLICA STATUS`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationState {
    pub is_replica: bool,
    /// Lag in seconds; `None` when the SQL thread is not running
    pub seconds_behind: Option<i64>,
    pub io_state: Option<String>,
    pub source_host: Option<String>,
    pub io_running: Option<String>,
    pub sql_running: Option<String>,
    pub last_error: Option<String>,
}

/// Binary-log position as reported by `SHOW MASTER STATUS`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryState {
    pub is_primary: bool,
    pub file: Option<String>,
    pub position: Option<u64>,
    pub binlog_do_db: Option<String>,
    pub binlog_ignore_db: Option<String>,
    pub executed_gtid_set: Option<String>,
}

/// First non-empty value among alternative column names.
fn column(row: &Row, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| row.get(*name).cloned().flatten())
        .find(|value| !value.is_empty())
}

fn has_column(row: &Row, names: &[&str]) -> bool {
    names.iter().any(|name| row.contains_key(*name))
}

const LAG_COLUMNS: &[&str] = &["seconds_behind_source", "seconds_behind_master"];

/// Interpret a replica status section.
#[must_use]
pub fn parse_replica_status(section: &str) -> ReplicationState {
    let Some(row) = parse_rows(section, &[])
        .into_iter()
        .find(|row| has_column(row, LAG_COLUMNS))
    else {
        return ReplicationState::default();
    };

    ReplicationState {
        is_replica: true,
        seconds_behind: column(&row, LAG_COLUMNS).and_then(|v| v.parse().ok()),
        io_state: column(&row, &["replica_io_state", "slave_io_state"]),
        source_host: column(&row, &["source_host", "master_host"]),
        io_running: column(&row, &["replica_io_running", "slave_io_running"]),
        sql_running: column(&row, &["replica_sql_running", "slave_sql_running"]),
        last_error: column(&row, &["last_error"]),
    }
}

/// Interpret a primary (binary log) status section.
#[must_use]
pub fn parse_primary_status(section: &str) -> PrimaryState {
    let found = parse_rows(section, &[]).into_iter().find_map(|row| {
        let file = column(&row, &["file"])?;
        let position = column(&row, &["position"])?.parse::<u64>().ok()?;
        Some((row, file, position))
    });
    let Some((row, file, position)) = found else {
        return PrimaryState::default();
    };

    PrimaryState {
        is_primary: true,
        file: Some(file),
        position: Some(position),
        binlog_do_db: column(&row, &["binlog_do_db"]),
        binlog_ignore_db: column(&row, &["binlog_ignore_db"]),
        executed_gtid_set: column(&row, &["executed_gtid_set"]),
    }
}
