//! The fixed set of diagnostic commands run against every target.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a diagnostic command, used to key results independent of
/// completion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    EngineStatus,
    GlobalStatus,
    ProcessList,
    GlobalVariables,
    ReplicaStatus,
    PrimaryStatus,
}

/// Shape of the report a command prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportShape {
    /// Free-form multi-section text (one cell of a `Type/Name/Status` row)
    FreeForm,
    /// `Variable_name<TAB>Value` pairs
    KeyValue,
    /// Header row followed by positional rows
    RowTable,
}

/// Immutable descriptor of one diagnostic command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticCommand {
    pub kind: CommandKind,
    /// Statement passed verbatim to the client's `-e`
    pub sql: &'static str,
    pub shape: ReportShape,
    /// Prefixes of the column-header line that identify this report when
    /// its banner is missing. Key/value reports all share one header, so
    /// they have none.
    pub header_prefixes: &'static [&'static str],
}

/// Canonical, ordered command list. Transcripts always present sections in
/// this order.
pub const DIAGNOSTIC_COMMANDS: &[DiagnosticCommand] = &[
    DiagnosticCommand {
        kind: CommandKind::EngineStatus,
        sql: "SHOW ENGINE INNODB STATUS",
        shape: ReportShape::FreeForm,
        header_prefixes: &["Type\tName\tStatus"],
    },
    DiagnosticCommand {
        kind: CommandKind::GlobalStatus,
        sql: "SHOW GLOBAL STATUS",
        shape: ReportShape::KeyValue,
        header_prefixes: &[],
    },
    DiagnosticCommand {
        kind: CommandKind::ProcessList,
        sql: "SHOW FULL PROCESSLIST",
        shape: ReportShape::RowTable,
        header_prefixes: &["Id\tUser\tHost"],
    },
    DiagnosticCommand {
        kind: CommandKind::GlobalVariables,
        sql: "SHOW GLOBAL VARIABLES",
        shape: ReportShape::KeyValue,
        header_prefixes: &[],
    },
    DiagnosticCommand {
        kind: CommandKind::ReplicaStatus,
        sql: "SHOW REPLICA STATUS",
        shape: ReportShape::RowTable,
        header_prefixes: &["Replica_IO_State\t", "Slave_IO_State\t"],
    },
    DiagnosticCommand {
        kind: CommandKind::PrimaryStatus,
        sql: "SHOW MASTER STATUS",
        shape: ReportShape::RowTable,
        header_prefixes: &["File\tPosition"],
    },
];

impl CommandKind {
    /// Descriptor for this kind from [`DIAGNOSTIC_COMMANDS`]
    #[must_use]
    pub fn descriptor(self) -> &'static DiagnosticCommand {
        match self {
            CommandKind::EngineStatus => &DIAGNOSTIC_COMMANDS[0],
            CommandKind::GlobalStatus => &DIAGNOSTIC_COMMANDS[1],
            CommandKind::ProcessList => &DIAGNOSTIC_COMMANDS[2],
            CommandKind::GlobalVariables => &DIAGNOSTIC_COMMANDS[3],
            CommandKind::ReplicaStatus => &DIAGNOSTIC_COMMANDS[4],
            CommandKind::PrimaryStatus => &DIAGNOSTIC_COMMANDS[5],
        }
    }

    #[must_use]
    pub fn sql(self) -> &'static str {
        self.descriptor().sql
    }

    /// Whether this command only reports a replication role
    #[must_use]
    pub fn is_role_check(self) -> bool {
        matches!(self, CommandKind::ReplicaStatus | CommandKind::PrimaryStatus)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}
