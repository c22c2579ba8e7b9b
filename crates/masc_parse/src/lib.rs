//! masc_parse - Tolerant parsers for MySQL diagnostic transcripts
//!
//! A transcript is the text the collector writes for one host: a header,
//! one banner-delimited block per diagnostic command, and a trailer. This
//! crate turns it back into typed records:
//! - [`section`] isolates one command's output, falling back through
//!   progressively looser strategies
//! - [`engine`] decomposes `SHOW ENGINE INNODB STATUS`
//! - [`tabular`] handles the key/value and row-table report shapes
//! - [`process`], [`replication`] and [`metrics`] interpret specific reports
//!
//! Parsing never fails. Missing sections and malformed values degrade to
//! defaults, and [`ParsedSnapshot::sources`] records how each section was found.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod command;
pub mod engine;
pub mod metrics;
pub mod process;
pub mod replication;
pub mod section;
pub mod tabular;

#[cfg(test)]
mod fixtures;

pub use command::{CommandKind, DIAGNOSTIC_COMMANDS, DiagnosticCommand, ReportShape};
pub use engine::{
    EngineStatusReport, parse_engine_status, parse_engine_text, render_engine_status,
};
pub use metrics::KeyMetrics;
pub use process::{ProcessFilter, ProcessRow, RowId, filter_processes, parse_process_list};
pub use replication::{PrimaryState, ReplicationState, parse_primary_status, parse_replica_status};
pub use section::{HEADER_RULE, SECTION_RULE, Section, SectionSource, extract_section};
pub use tabular::{
    CONFIG_VARIABLES_ALLOWLIST, ConfigVariables, CounterMap, CounterValue,
    parse_config_variables, parse_counters,
};

/// Everything recoverable from one transcript
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedSnapshot {
    pub engine_status: EngineStatusReport,
    pub global_status: CounterMap,
    pub processes: Vec<ProcessRow>,
    /// All configuration variables, not only the allowlisted ones
    pub config_variables: ConfigVariables,
    pub replication: ReplicationState,
    pub primary: PrimaryState,
    pub metrics: KeyMetrics,
    pub sources: BTreeMap<CommandKind, SectionSource>,
}

impl ParsedSnapshot {
    /// Config variables restricted to [`CONFIG_VARIABLES_ALLOWLIST`]
    #[must_use]
    pub fn allowlisted_variables(&self) -> ConfigVariables {
        self.config_variables
            .iter()
            .filter(|(name, _)| CONFIG_VARIABLES_ALLOWLIST.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Commands whose section could not be isolated
    pub fn passthrough_sections(&self) -> impl Iterator<Item = CommandKind> + '_ {
        self.sources
            .iter()
            .filter(|(_, source)| **source == SectionSource::Passthrough)
            .map(|(kind, _)| *kind)
    }
}

/// Parse every section of a transcript.
#[must_use]
pub fn parse_transcript(transcript: &str) -> ParsedSnapshot {
    let mut sources = BTreeMap::new();
    let mut section = |kind: CommandKind| {
        let section = extract_section(transcript, kind);
        sources.insert(kind, section.source);
        section.body
    };

    let engine_status = parse_engine_text(section(CommandKind::EngineStatus));
    let global_status = parse_counters(section(CommandKind::GlobalStatus));
    let processes = parse_process_list(section(CommandKind::ProcessList));
    let config_variables = parse_config_variables(section(CommandKind::GlobalVariables), None);
    let replication = parse_replica_status(section(CommandKind::ReplicaStatus));
    let primary = parse_primary_status(section(CommandKind::PrimaryStatus));
    let metrics = KeyMetrics::from_counters(&global_status);

    ParsedSnapshot {
        engine_status,
        global_status,
        processes,
        config_variables,
        replication,
        primary,
        metrics,
        sources,
    }
}
