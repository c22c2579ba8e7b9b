//! Tab-delimited reports: `name<TAB>value` pairs and header-plus-rows tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration variables worth reviewing on every server
pub const CONFIG_VARIABLES_ALLOWLIST: &[&str] = &[
    // Memory and buffer pool
    "innodb_buffer_pool_size",
    "innodb_buffer_pool_instances",
    "innodb_log_buffer_size",
    "tmp_table_size",
    "max_heap_table_size",
    // Connections and threads
    "max_connections",
    "thread_cache_size",
    "wait_timeout",
    "interactive_timeout",
    "max_prepared_stmt_count",
    // Table and metadata caches
    "table_open_cache",
    "table_definition_cache",
    "open_files_limit",
    // Redo log
    "innodb_log_file_size",
    "innodb_log_files_in_group",
    "innodb_flush_log_at_trx_commit",
    // InnoDB I/O
    "innodb_io_capacity",
    "innodb_io_capacity_max",
    "innodb_read_io_threads",
    "innodb_write_io_threads",
    "innodb_sync_array_size",
    "innodb_change_buffering",
    // Replication
    "sync_binlog",
    "binlog_format",
    "binlog_group_commit_sync_delay",
    "slave_parallel_workers",
    "slave_preserve_commit_order",
    // Read-only mode
    "read_only",
    "super_read_only",
    // Transactions
    "transaction_isolation",
];

/// Column names assumed when a process list arrives without its header row
pub const DEFAULT_PROCESS_COLUMNS: &[&str] =
    &["id", "user", "host", "db", "command", "time", "state", "info"];

/// A counter value, coerced from text where possible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CounterValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl CounterValue {
    /// Decimal point means float, otherwise integer, otherwise text.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        if raw.contains('.') {
            if let Ok(value) = raw.parse::<f64>() {
                return CounterValue::Float(value);
            }
        } else if let Ok(value) = raw.parse::<i64>() {
            return CounterValue::Int(value);
        }
        CounterValue::Text(raw.to_string())
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CounterValue::Int(v) => Some(*v),
            CounterValue::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            CounterValue::Float(_) => None,
            CounterValue::Text(s) => s.trim().parse().ok(),
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CounterValue::Int(v) => Some(*v as f64),
            CounterValue::Float(v) => Some(*v),
            CounterValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Counter name to value; the last occurrence of a name wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterMap(BTreeMap<String, CounterValue>);

impl CounterMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: CounterValue) {
        self.0.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CounterValue> {
        self.0.get(name)
    }

    /// Integer value of a counter, if present and numeric
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(CounterValue::as_i64)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CounterValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, CounterValue)> for CounterMap {
    fn from_iter<I: IntoIterator<Item = (String, CounterValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Configuration variable name (lower-cased) to raw value
pub type ConfigVariables = BTreeMap<String, String>;

/// `name<TAB>value` pairs from a key/value report, header and table-border
/// artifacts skipped.
fn key_value_pairs(section: &str) -> impl Iterator<Item = (&str, &str)> {
    section.trim().lines().filter_map(|line| {
        if line.starts_with("Variable_name") || line.trim().is_empty() {
            return None;
        }
        let mut parts = line.split('\t');
        let name = parts.next()?.trim();
        let value = parts.next()?.trim();
        if name.is_empty() || name.starts_with(['+', '|', '=']) {
            return None;
        }
        Some((name, value))
    })
}

/// Parse a global status report into typed counters.
#[must_use]
pub fn parse_counters(section: &str) -> CounterMap {
    key_value_pairs(section)
        .map(|(name, value)| (name.to_string(), CounterValue::coerce(value)))
        .collect()
}

/// Parse a global variables report. Names are lower-cased; with an
/// allowlist, names outside it are dropped.
#[must_use]
pub fn parse_config_variables(section: &str, allowlist: Option<&[&str]>) -> ConfigVariables {
    key_value_pairs(section)
        .map(|(name, value)| (name.to_lowercase(), value.to_string()))
        .filter(|(name, _)| allowlist.is_none_or(|allowed| allowed.contains(&name.as_str())))
        .collect()
}

/// One row of a header-plus-rows report; `None` marks a NULL cell.
pub type Row = BTreeMap<String, Option<String>>;

fn cell(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value == "NULL" || value == "\\N" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a row table. The first line names the columns (lower-cased); when
/// it has no tab, `default_columns` are used instead and the line is still
/// consumed. Rows with fewer than two fields are skipped.
#[must_use]
pub fn parse_rows(section: &str, default_columns: &[&str]) -> Vec<Row> {
    let mut lines = section.trim().lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };

    let columns: Vec<String> = if header.contains('\t') {
        header.split('\t').map(|h| h.trim().to_lowercase()).collect()
    } else {
        default_columns.iter().map(|c| (*c).to_string()).collect()
    };

    lines
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 2 {
                return None;
            }
            let row: Row = columns
                .iter()
                .zip(parts)
                .map(|(column, raw)| (column.clone(), cell(raw)))
                .collect();
            Some(row)
        })
        .collect()
}
