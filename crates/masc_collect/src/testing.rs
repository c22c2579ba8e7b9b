//! In-process stand-in for the client, used by the unit tests.

use crate::runner::{CommandResult, CommandRunner};
use async_trait::async_trait;
use chrono::Local;
use masc_config::Target;
use masc_parse::CommandKind;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub const ENGINE_STATUS: &str = "Type\tName\tStatus\nInnoDB\t\t\\n=====================================\\n2024-05-01 10:00:00 0x7f INNODB MONITOR OUTPUT\\n=====================================\\nPer second averages calculated from the last 5 seconds\\n---\\nLOG\\n---\\nLog sequence number          2000\\nLog flushed up to            2000\\nLast checkpoint at           1500\\n----------------------\\nBUFFER POOL AND MEMORY\\n----------------------\\nBuffer pool size   1024\\nFree buffers       100\\nDatabase pages     900\\nModified db pages  9\\n----------------------------\\nEND OF INNODB MONITOR OUTPUT\\n============================\\n\n";

pub const GLOBAL_STATUS: &str =
    "Variable_name\tValue\nThreads_connected\t5\nOpen_tables\t100\nOpen_table_definitions\t90\n";

pub const PROCESS_LIST: &str = "Id\tUser\tHost\tdb\tCommand\tTime\tState\tInfo\n7\tobserver\tlocalhost\tNULL\tQuery\t0\tinit\tSHOW FULL PROCESSLIST\n";

pub const GLOBAL_VARIABLES: &str = "Variable_name\tValue\ninnodb_buffer_pool_size\t134217728\nmax_connections\t151\nsync_binlog\t1\nversion\t8.0.36\n";

pub const PRIMARY_STATUS: &str = "File\tPosition\tBinlog_Do_DB\tBinlog_Ignore_DB\tExecuted_Gtid_Set\nbinlog.000003\t157\t\t\t\n";

pub fn sample_output(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::EngineStatus => ENGINE_STATUS,
        CommandKind::GlobalStatus => GLOBAL_STATUS,
        CommandKind::ProcessList => PROCESS_LIST,
        CommandKind::GlobalVariables => GLOBAL_VARIABLES,
        CommandKind::ReplicaStatus => "",
        CommandKind::PrimaryStatus => PRIMARY_STATUS,
    }
}

/// Answers with canned output after an optional delay; can fail chosen
/// commands or every command of chosen targets.
#[derive(Clone, Default)]
pub struct FakeRunner {
    delays: HashMap<CommandKind, Duration>,
    failures: HashMap<CommandKind, String>,
    failing_targets: HashSet<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, kind: CommandKind, delay: Duration) -> Self {
        self.delays.insert(kind, delay);
        self
    }

    pub fn failing(mut self, kind: CommandKind, error: &str) -> Self {
        self.failures.insert(kind, error.to_string());
        self
    }

    pub fn failing_target(mut self, target_id: &str) -> Self {
        self.failing_targets.insert(target_id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, target: &Target, kind: CommandKind) -> CommandResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let started_at = Local::now();
        let clock = Instant::now();

        if let Some(delay) = self.delays.get(&kind) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing_targets.contains(&target.id) {
            return CommandResult::failed(
                kind,
                format!("ERROR 2003 (HY000): Can't connect to MySQL server on '{}'", target.host),
                started_at,
                clock.elapsed(),
            );
        }
        match self.failures.get(&kind) {
            Some(error) => CommandResult::failed(kind, error.clone(), started_at, clock.elapsed()),
            None => CommandResult::succeeded(kind, sample_output(kind), started_at, clock.elapsed()),
        }
    }
}
