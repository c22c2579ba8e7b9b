//! Transcript and timing report layout.
//!
//! ```text
//! ############################################################
//! # MySQL Diagnostic Collection
//! # Host: db1:3306
//! # User: observer
//! # Started: 2024-05-01 10:00:00
//! # Mode: Parallel (6 concurrent connections)
//! ############################################################
//!
//! ============================================================
//! -- SHOW GLOBAL STATUS
//! -- Time: 2024-05-01 10:00:00 -> 2024-05-01 10:00:01 (0.42s)
//! ============================================================
//! <output, or "-- ERROR: <message>">
//! ...
//!
//! ############################################################
//! # Collection completed: 2024-05-01 10:00:02
//! # Total time: 1.73s (parallel)
//! ############################################################
//! ```

use crate::runner::CommandResult;
use chrono::{DateTime, Local};
use masc_config::{CollectionMode, Target};
use masc_parse::{HEADER_RULE, SECTION_RULE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Timestamp format used inside transcripts
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn stamp(ts: &DateTime<Local>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn mode_line(mode: CollectionMode, connections: usize) -> String {
    match mode {
        CollectionMode::Parallel => format!("Parallel ({connections} concurrent connections)"),
        CollectionMode::Sequential => "Sequential".to_string(),
    }
}

fn mode_word(mode: CollectionMode) -> &'static str {
    match mode {
        CollectionMode::Parallel => "parallel",
        CollectionMode::Sequential => "sequential",
    }
}

#[must_use]
pub fn render_header(
    target: &Target,
    mode: CollectionMode,
    connections: usize,
    started_at: &DateTime<Local>,
) -> String {
    [
        HEADER_RULE.to_string(),
        "# MySQL Diagnostic Collection".to_string(),
        format!("# Host: {}", target.address()),
        format!("# User: {}", target.user),
        format!("# Started: {}", stamp(started_at)),
        format!("# Mode: {}", mode_line(mode, connections)),
        HEADER_RULE.to_string(),
    ]
    .join("\n")
}

#[must_use]
pub fn render_block(result: &CommandResult) -> String {
    format!(
        "\n{SECTION_RULE}\n-- {sql}\n-- Time: {start} -> {end} ({secs:.2}s)\n{SECTION_RULE}\n{body}",
        sql = result.kind.sql(),
        start = stamp(&result.started_at),
        end = stamp(&result.finished_at),
        secs = result.duration.as_secs_f64(),
        body = result.body(),
    )
}

#[must_use]
pub fn render_trailer(
    mode: CollectionMode,
    completed_at: &DateTime<Local>,
    total: Duration,
) -> String {
    [
        format!("\n{HEADER_RULE}"),
        format!("# Collection completed: {}", stamp(completed_at)),
        format!(
            "# Total time: {:.2}s ({})",
            total.as_secs_f64(),
            mode_word(mode)
        ),
        HEADER_RULE.to_string(),
    ]
    .join("\n")
}

/// Full transcript: header, one block per result in the given order, trailer.
#[must_use]
pub fn render_transcript(
    target: &Target,
    mode: CollectionMode,
    connections: usize,
    started_at: &DateTime<Local>,
    completed_at: &DateTime<Local>,
    total: Duration,
    results: &[CommandResult],
) -> String {
    let mut parts = Vec::with_capacity(results.len() + 2);
    parts.push(render_header(target, mode, connections, started_at));
    parts.extend(results.iter().map(render_block));
    parts.push(render_trailer(mode, completed_at, total));
    parts.join("\n")
}

/// Milliseconds precision, as stored in the timing report
fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommandTiming {
    /// Seconds
    pub duration: f64,
    pub success: bool,
}

/// Per-command durations next to the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingReport {
    pub started_at: DateTime<Local>,
    pub completed_at: DateTime<Local>,
    /// Wall-clock seconds for the whole collection
    pub total_duration: f64,
    /// Keyed by the command's SQL text
    pub commands: BTreeMap<String, CommandTiming>,
}

impl TimingReport {
    #[must_use]
    pub fn new(
        started_at: DateTime<Local>,
        completed_at: DateTime<Local>,
        total: Duration,
        results: &[CommandResult],
    ) -> Self {
        let commands = results
            .iter()
            .map(|r| {
                (
                    r.kind.sql().to_string(),
                    CommandTiming {
                        duration: round_millis(r.duration.as_secs_f64()),
                        success: r.success,
                    },
                )
            })
            .collect();

        Self {
            started_at,
            completed_at,
            total_duration: round_millis(total.as_secs_f64()),
            commands,
        }
    }

    /// Sum of the per-command durations
    #[must_use]
    pub fn command_time(&self) -> f64 {
        self.commands.values().map(|c| c.duration).sum()
    }
}
