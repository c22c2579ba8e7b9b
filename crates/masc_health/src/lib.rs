//! masc_health - Health bands for MySQL configuration variables
//!
//! Each allowlisted configuration variable present on the server gets a
//! [`HealthEntry`]. Variables with a rule are compared against fixed
//! thresholds or against live counters; the rest are reported with
//! [`HealthBand::Indeterminate`] so the whole allowlist stays visible.

use masc_parse::{CONFIG_VARIABLES_ALLOWLIST, ConfigVariables, CounterMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const MIB: i128 = 1024 * 1024;

/// Qualitative classification of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthBand {
    Healthy,
    Warning,
    Critical,
    /// A comparison input was missing, or no rule applies
    Indeterminate,
}

impl HealthBand {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HealthBand::Healthy => "healthy",
            HealthBand::Warning => "warning",
            HealthBand::Critical => "critical",
            HealthBand::Indeterminate => "indeterminate",
        }
    }
}

impl std::fmt::Display for HealthBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthEntry {
    pub name: String,
    /// Value exactly as the server reported it
    pub value: String,
    pub band: HealthBand,
    pub reason: String,
}

/// Facts about the host that the server itself does not report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub total_memory_bytes: Option<u64>,
}

impl SystemInfo {
    #[must_use]
    pub fn with_total_memory(total_memory_bytes: Option<u64>) -> Self {
        Self { total_memory_bytes }
    }
}

/// Variable name to health entry
pub type HealthReport = BTreeMap<String, HealthEntry>;

/// Everything a rule may look at
struct Inputs<'a> {
    config: &'a ConfigVariables,
    counters: &'a CounterMap,
    system: &'a SystemInfo,
}

impl Inputs<'_> {
    /// Integer config value; missing or malformed reads as 0
    fn var(&self, name: &str) -> i128 {
        self.config
            .get(name)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map_or(0, i128::from)
    }

    /// Integer counter; missing or malformed reads as 0
    fn counter(&self, name: &str) -> i128 {
        self.counters.get_i64(name).map_or(0, i128::from)
    }
}

type Verdict = (HealthBand, String);
type Rule = fn(&Inputs<'_>) -> Verdict;

const RULES: &[(&str, Rule)] = &[
    ("innodb_buffer_pool_size", buffer_pool_size),
    ("max_connections", max_connections),
    ("tmp_table_size", tmp_table_size),
    ("max_heap_table_size", max_heap_table_size),
    ("table_open_cache", table_open_cache),
    ("table_definition_cache", table_definition_cache),
    ("open_files_limit", open_files_limit),
    ("thread_cache_size", thread_cache_size),
    ("wait_timeout", wait_timeout),
    ("innodb_log_file_size", log_file_size),
    ("innodb_flush_log_at_trx_commit", flush_log_at_trx_commit),
    ("sync_binlog", sync_binlog),
    ("innodb_read_io_threads", read_io_threads),
    ("innodb_write_io_threads", write_io_threads),
];

/// Evaluate the standard allowlist.
#[must_use]
pub fn evaluate(config: &ConfigVariables, counters: &CounterMap, system: &SystemInfo) -> HealthReport {
    evaluate_with_allowlist(config, counters, system, CONFIG_VARIABLES_ALLOWLIST)
}

/// Evaluate every variable of `allowlist` present in `config`.
///
/// Variables outside the allowlist are ignored even when a rule exists.
#[must_use]
pub fn evaluate_with_allowlist(
    config: &ConfigVariables,
    counters: &CounterMap,
    system: &SystemInfo,
    allowlist: &[&str],
) -> HealthReport {
    let inputs = Inputs {
        config,
        counters,
        system,
    };

    let report: HealthReport = allowlist
        .iter()
        .filter_map(|name| {
            let value = config.get(*name)?;
            let (band, reason) = RULES
                .iter()
                .find(|(rule_name, _)| rule_name == name)
                .map_or_else(
                    || (HealthBand::Indeterminate, "No health rule".to_string()),
                    |(_, rule)| rule(&inputs),
                );
            Some((
                (*name).to_string(),
                HealthEntry {
                    name: (*name).to_string(),
                    value: value.clone(),
                    band,
                    reason,
                },
            ))
        })
        .collect();

    debug!(
        evaluated = report.len(),
        critical = report
            .values()
            .filter(|e| e.band == HealthBand::Critical)
            .count(),
        "config health evaluated"
    );
    report
}

/// Number of entries per band
#[must_use]
pub fn band_counts(report: &HealthReport) -> BTreeMap<HealthBand, usize> {
    let mut counts = BTreeMap::new();
    for entry in report.values() {
        *counts.entry(entry.band).or_insert(0) += 1;
    }
    counts
}

/// `part` as a percentage of `whole`, for display only
#[allow(clippy::cast_precision_loss)]
fn percent(part: i128, whole: i128) -> f64 {
    part as f64 / whole as f64 * 100.0
}

/// Digits grouped by thousands: 12345 -> "12,345"
fn grouped(n: i128) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

fn buffer_pool_size(inputs: &Inputs<'_>) -> Verdict {
    let Some(total) = inputs.system.total_memory_bytes.filter(|t| *t > 0) else {
        return (HealthBand::Indeterminate, "System RAM unknown".to_string());
    };
    let total = i128::from(total);
    let pool = inputs.var("innodb_buffer_pool_size").max(0);
    let pct = percent(pool, total);

    if pool * 100 >= total * 60 {
        (HealthBand::Healthy, format!("{pct:.0}% of RAM"))
    } else if pool * 100 >= total * 30 {
        (HealthBand::Warning, format!("{pct:.0}% of RAM (30-60%)"))
    } else {
        (HealthBand::Critical, format!("Only {pct:.0}% of RAM"))
    }
}

fn max_connections(inputs: &Inputs<'_>) -> Verdict {
    let max = inputs.var("max_connections");
    if max <= 0 {
        return (HealthBand::Indeterminate, "max_connections is 0".to_string());
    }
    let current = inputs.counter("Threads_connected");
    let reason = format!("{:.0}% used ({current}/{max})", percent(current, max));

    let band = if current * 100 > max * 95 {
        HealthBand::Critical
    } else if current * 100 >= max * 80 {
        HealthBand::Warning
    } else {
        HealthBand::Healthy
    };
    (band, reason)
}

fn tmp_table_size(inputs: &Inputs<'_>) -> Verdict {
    let size = inputs.var("tmp_table_size");
    if size >= 64 * MIB {
        (HealthBand::Healthy, "≥ 64MB".to_string())
    } else if size >= 16 * MIB {
        (HealthBand::Warning, "16-64MB range".to_string())
    } else {
        (HealthBand::Critical, "< 16MB".to_string())
    }
}

fn max_heap_table_size(inputs: &Inputs<'_>) -> Verdict {
    let tmp = inputs.var("tmp_table_size");
    if tmp <= 0 {
        return (HealthBand::Indeterminate, "tmp_table_size unknown".to_string());
    }
    if inputs.var("max_heap_table_size") >= tmp {
        (HealthBand::Healthy, "≥ tmp_table_size".to_string())
    } else {
        (
            HealthBand::Warning,
            "< tmp_table_size (limits temp tables)".to_string(),
        )
    }
}

fn table_open_cache(inputs: &Inputs<'_>) -> Verdict {
    let cache = inputs.var("table_open_cache");
    let open = inputs.counter("Open_tables");
    let overflows = inputs.counter("Table_open_cache_overflows");

    if overflows > 0 {
        (HealthBand::Critical, format!("{} overflows", grouped(overflows)))
    } else if cache >= open {
        (
            HealthBand::Healthy,
            format!("Cache ({}) ≥ Open ({})", grouped(cache), grouped(open)),
        )
    } else {
        (
            HealthBand::Warning,
            format!("Cache ({}) < Open ({})", grouped(cache), grouped(open)),
        )
    }
}

fn table_definition_cache(inputs: &Inputs<'_>) -> Verdict {
    let open_defs = inputs.counter("Open_table_definitions");
    if open_defs <= 0 {
        return (
            HealthBand::Indeterminate,
            "Open_table_definitions unavailable".to_string(),
        );
    }
    let cache = inputs.var("table_definition_cache");
    if cache >= open_defs {
        (
            HealthBand::Healthy,
            format!("Cache ({}) ≥ Open defs ({})", grouped(cache), grouped(open_defs)),
        )
    } else {
        (
            HealthBand::Warning,
            format!("Cache ({}) < Open defs ({})", grouped(cache), grouped(open_defs)),
        )
    }
}

fn open_files_limit(inputs: &Inputs<'_>) -> Verdict {
    let table_cache = inputs.var("table_open_cache");
    if table_cache <= 0 {
        return (HealthBand::Indeterminate, "table_open_cache unknown".to_string());
    }
    if inputs.var("open_files_limit") >= table_cache * 2 {
        (HealthBand::Healthy, "≥ 2× table_open_cache".to_string())
    } else {
        (
            HealthBand::Warning,
            format!("< 2× table_open_cache ({})", grouped(table_cache * 2)),
        )
    }
}

fn thread_cache_size(inputs: &Inputs<'_>) -> Verdict {
    if inputs.var("thread_cache_size") > 0 {
        (HealthBand::Healthy, "Thread caching enabled".to_string())
    } else {
        (HealthBand::Warning, "Thread caching disabled".to_string())
    }
}

fn wait_timeout(inputs: &Inputs<'_>) -> Verdict {
    let timeout = inputs.var("wait_timeout");
    if timeout >= 300 {
        (HealthBand::Healthy, format!("≥ 300s ({timeout}s)"))
    } else if timeout >= 60 {
        (HealthBand::Warning, format!("60-300s range ({timeout}s)"))
    } else {
        (HealthBand::Critical, format!("< 60s ({timeout}s)"))
    }
}

fn log_file_size(inputs: &Inputs<'_>) -> Verdict {
    let size = inputs.var("innodb_log_file_size");
    if size >= 512 * MIB {
        (HealthBand::Healthy, "≥ 512MB".to_string())
    } else if size >= 128 * MIB {
        (HealthBand::Warning, "128-512MB range".to_string())
    } else {
        (HealthBand::Critical, "< 128MB".to_string())
    }
}

fn flush_log_at_trx_commit(inputs: &Inputs<'_>) -> Verdict {
    match inputs.var("innodb_flush_log_at_trx_commit") {
        1 => (HealthBand::Healthy, "Full ACID compliance".to_string()),
        2 => (
            HealthBand::Warning,
            "Flush to OS only (risk on crash)".to_string(),
        ),
        _ => (HealthBand::Critical, "No flush (data loss risk)".to_string()),
    }
}

fn sync_binlog(inputs: &Inputs<'_>) -> Verdict {
    match inputs.var("sync_binlog") {
        1 => (HealthBand::Healthy, "Sync after each transaction".to_string()),
        0 => (HealthBand::Warning, "No sync (OS-dependent)".to_string()),
        n => (HealthBand::Healthy, format!("Sync every {n} transactions")),
    }
}

fn io_threads(value: i128, kind: &str) -> Verdict {
    if value >= 4 {
        (HealthBand::Healthy, format!("{value} threads"))
    } else if value > 0 {
        (HealthBand::Warning, format!("Only {value} thread(s)"))
    } else {
        (HealthBand::Critical, format!("No {kind} threads"))
    }
}

fn read_io_threads(inputs: &Inputs<'_>) -> Verdict {
    io_threads(inputs.var("innodb_read_io_threads"), "read")
}

fn write_io_threads(inputs: &Inputs<'_>) -> Verdict {
    io_threads(inputs.var("innodb_write_io_threads"), "write")
}
