//! Running the full diagnostic command set against one target.

use crate::runner::{CommandResult, CommandRunner};
use crate::transcript::{TimingReport, render_transcript};
use chrono::{DateTime, Local};
use futures::stream::{self, StreamExt};
use masc_config::{CollectionMode, CollectionPolicy, Target};
use masc_parse::{CommandKind, DIAGNOSTIC_COMMANDS};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Everything one collection attempt produced
#[derive(Debug, Clone)]
pub struct Collection {
    pub target_id: String,
    pub mode: CollectionMode,
    /// Whether every command the policy requires succeeded
    pub success: bool,
    pub transcript: String,
    pub timing: TimingReport,
    /// Results in canonical command order
    pub results: Vec<CommandResult>,
    pub duration: Duration,
}

impl Collection {
    /// Error of the first failed command, in canonical order
    #[must_use]
    pub fn first_error(&self) -> Option<&str> {
        self.results
            .iter()
            .find(|r| !r.success)
            .and_then(|r| r.error.as_deref())
    }

    /// Commands that failed, in canonical order
    pub fn failed_commands(&self) -> impl Iterator<Item = CommandKind> + '_ {
        self.results.iter().filter(|r| !r.success).map(|r| r.kind)
    }
}

/// Runs every diagnostic command against a target, concurrently or in turn
#[derive(Clone)]
pub struct ParallelCollector {
    runner: Arc<dyn CommandRunner>,
    policy: CollectionPolicy,
}

impl ParallelCollector {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            policy: CollectionPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CollectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> CollectionPolicy {
        self.policy
    }

    /// Whether a failed result fails the whole target
    fn is_fatal(&self, result: &CommandResult) -> bool {
        !result.success
            && !(self.policy == CollectionPolicy::RoleChecksOptional && result.kind.is_role_check())
    }

    /// Collect from `target`. Never fails: command failures are carried in
    /// the returned [`Collection`].
    #[instrument(skip(self, target), fields(host_id = %target.id))]
    pub async fn collect(&self, target: &Target, mode: CollectionMode) -> Collection {
        let started_at = Local::now();
        let clock = Instant::now();
        info!(
            label = %target.display_name(),
            address = %target.address(),
            ?mode,
            commands = DIAGNOSTIC_COMMANDS.len(),
            "Starting collection"
        );

        let results = match mode {
            CollectionMode::Parallel => self.run_parallel(target).await,
            CollectionMode::Sequential => self.run_sequential(target).await,
        };

        let duration = clock.elapsed();
        let completed_at = Local::now();
        let success = !results.iter().any(|r| self.is_fatal(r));

        let collection = self.assemble(target, mode, started_at, completed_at, duration, results, success);

        if success {
            info!(
                duration_secs = duration.as_secs_f64(),
                command_secs = collection.timing.command_time(),
                "Collection complete"
            );
        } else {
            warn!(
                duration_secs = duration.as_secs_f64(),
                error = collection.first_error().unwrap_or("unknown"),
                "Collection failed"
            );
        }
        collection
    }

    /// One worker per command; results reassembled in canonical order.
    async fn run_parallel(&self, target: &Target) -> Vec<CommandResult> {
        let runner = self.runner.as_ref();
        let mut by_kind: BTreeMap<CommandKind, CommandResult> =
            stream::iter(DIAGNOSTIC_COMMANDS.iter().map(|c| c.kind))
                .map(|kind| async move { runner.run(target, kind).await })
                .buffer_unordered(DIAGNOSTIC_COMMANDS.len())
                .map(|result| (result.kind, result))
                .collect()
                .await;

        DIAGNOSTIC_COMMANDS
            .iter()
            .filter_map(|c| by_kind.remove(&c.kind))
            .collect()
    }

    /// One command at a time, stopping after the first fatal failure.
    async fn run_sequential(&self, target: &Target) -> Vec<CommandResult> {
        let mut results = Vec::with_capacity(DIAGNOSTIC_COMMANDS.len());
        for command in DIAGNOSTIC_COMMANDS {
            let result = self.runner.run(target, command.kind).await;
            let fatal = self.is_fatal(&result);
            results.push(result);
            if fatal {
                break;
            }
        }
        results
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        target: &Target,
        mode: CollectionMode,
        started_at: DateTime<Local>,
        completed_at: DateTime<Local>,
        duration: Duration,
        results: Vec<CommandResult>,
        success: bool,
    ) -> Collection {
        let transcript = render_transcript(
            target,
            mode,
            DIAGNOSTIC_COMMANDS.len(),
            &started_at,
            &completed_at,
            duration,
            &results,
        );
        let timing = TimingReport::new(started_at, completed_at, duration, &results);

        Collection {
            target_id: target.id.clone(),
            mode,
            success,
            transcript,
            timing,
            results,
            duration,
        }
    }
}
