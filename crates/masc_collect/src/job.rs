//! A collection job: every selected target, one after another, with progress
//! reported to the job store and artifacts written to the run archive.

use crate::CollectError;
use crate::collector::{Collection, ParallelCollector};
use crate::runner::{ClientRunner, CommandRunner};
use masc_config::{CollectionMode, MascConfig, Target};
use masc_health::{SystemInfo, band_counts, evaluate};
use masc_parse::{parse_transcript, render_engine_status};
use masc_store::archive::files;
use masc_store::{JobStore, RunArchive, RunStatus, StoreError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// Outcome for one target of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostOutcome {
    pub host_id: String,
    pub label: String,
    pub success: bool,
    pub error: Option<String>,
    /// Seconds spent collecting
    pub duration: f64,
    /// Directory holding this host's artifacts, when anything was archived
    pub archive_dir: Option<PathBuf>,
}

impl HostOutcome {
    fn failed(host_id: &str, label: &str, error: String) -> Self {
        Self {
            host_id: host_id.to_string(),
            label: label.to_string(),
            success: false,
            error: Some(error),
            duration: 0.0,
            archive_dir: None,
        }
    }
}

/// Summary of a whole job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub status: RunStatus,
    pub hosts_attempted: usize,
    pub hosts_succeeded: usize,
    pub hosts_failed: usize,
    /// Seconds
    pub total_duration: f64,
    pub results: Vec<HostOutcome>,
}

impl JobSummary {
    fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: RunStatus::Running,
            hosts_attempted: 0,
            hosts_succeeded: 0,
            hosts_failed: 0,
            total_duration: 0.0,
            results: Vec::new(),
        }
    }

    fn add_result(&mut self, result: HostOutcome) {
        self.hosts_attempted += 1;
        if result.success {
            self.hosts_succeeded += 1;
        } else {
            self.hosts_failed += 1;
        }
        self.results.push(result);
    }

    /// Completed unless no host succeeded
    fn finish(&mut self, elapsed: Duration) {
        self.total_duration = elapsed.as_secs_f64();
        self.status = if self.hosts_succeeded > 0 {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
    }
}

pub struct CollectionJob {
    collector: ParallelCollector,
    store: Arc<dyn JobStore>,
    archive: RunArchive,
    inventory: Vec<Target>,
    mode: CollectionMode,
}

impl CollectionJob {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn JobStore>,
        archive: RunArchive,
        inventory: Vec<Target>,
    ) -> Self {
        Self {
            collector: ParallelCollector::new(runner),
            store,
            archive,
            inventory,
            mode: CollectionMode::default(),
        }
    }

    /// Job wired to the external client, inventory and archive from `config`
    pub fn from_config(config: &MascConfig, store: Arc<dyn JobStore>) -> Self {
        let runner = Arc::new(ClientRunner::from_config(&config.collector));
        Self::new(
            runner,
            store,
            RunArchive::new(config.global.runs_dir.clone()),
            config.hosts.clone(),
        )
        .with_mode(config.collector.mode)
        .with_policy(config.collector.policy)
    }

    #[must_use]
    pub fn with_mode(mut self, mode: CollectionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: masc_config::CollectionPolicy) -> Self {
        self.collector = self.collector.with_policy(policy);
        self
    }

    #[must_use]
    pub fn archive(&self) -> &RunArchive {
        &self.archive
    }

    /// Collect from `host_ids` in order.
    ///
    /// Host failures are recorded, not returned; the job is failed only when
    /// no host succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Store`] when the job store cannot be updated.
    #[instrument(skip(self, host_ids), fields(hosts = host_ids.len()))]
    pub async fn run(&self, job_id: &str, host_ids: &[String]) -> Result<JobSummary, CollectError> {
        let clock = Instant::now();
        self.store.create_job(job_id, host_ids)?;
        self.store.set_job_status(job_id, RunStatus::Running, None)?;
        info!(job_id, hosts = host_ids.len(), mode = ?self.mode, "Job started");

        let mut summary = JobSummary::new(job_id);
        if let Err(e) = self.collect_hosts(job_id, host_ids, &mut summary).await {
            self.abandon(job_id, &e);
            return Err(e.into());
        }

        summary.finish(clock.elapsed());
        let job_error = (summary.status == RunStatus::Failed).then(|| {
            if host_ids.is_empty() {
                "No hosts selected".to_string()
            } else {
                format!("All {} hosts failed", summary.hosts_failed)
            }
        });
        self.store
            .set_job_status(job_id, summary.status, job_error.as_deref())?;

        info!(
            job_id,
            status = %summary.status,
            hosts_succeeded = summary.hosts_succeeded,
            hosts_failed = summary.hosts_failed,
            duration_secs = summary.total_duration,
            "Job finished"
        );
        Ok(summary)
    }

    async fn collect_hosts(
        &self,
        job_id: &str,
        host_ids: &[String],
        summary: &mut JobSummary,
    ) -> Result<(), StoreError> {
        for host_id in host_ids {
            self.store
                .set_host_status(job_id, host_id, RunStatus::Running, None)?;

            let outcome = match self.inventory.iter().find(|t| &t.id == host_id) {
                Some(target) => self.collect_host(job_id, target).await,
                None => {
                    let error = CollectError::HostNotFound(host_id.clone()).to_string();
                    warn!(job_id, host_id = %host_id, "host not in inventory");
                    HostOutcome::failed(host_id, host_id, error)
                }
            };

            let status = if outcome.success {
                RunStatus::Completed
            } else {
                RunStatus::Failed
            };
            self.store
                .set_host_status(job_id, host_id, status, outcome.error.as_deref())?;
            summary.add_result(outcome);
        }
        Ok(())
    }

    /// Best effort: a job whose progress can no longer be recorded is marked
    /// failed so it does not stay `running` forever.
    fn abandon(&self, job_id: &str, cause: &StoreError) {
        let message = format!("Store error: {cause}");
        if let Err(e) = self
            .store
            .set_job_status(job_id, RunStatus::Failed, Some(&message))
        {
            warn!(job_id, error = %e, "could not mark job failed");
        }
        error!(job_id, error = %cause, "job abandoned");
    }

    async fn collect_host(&self, job_id: &str, target: &Target) -> HostOutcome {
        let collection = self.collector.collect(target, self.mode).await;
        let mut outcome = HostOutcome {
            host_id: target.id.clone(),
            label: target.display_name().to_string(),
            success: collection.success,
            error: collection.first_error().map(str::to_string),
            duration: collection.duration.as_secs_f64(),
            archive_dir: None,
        };
        if outcome.success {
            outcome.error = None;
        }

        if let Err(e) = self
            .archive
            .write_text(job_id, &target.id, files::RAW, &collection.transcript)
        {
            error!(job_id, host_id = %target.id, error = %e, "failed to write transcript");
            outcome.success = false;
            outcome.error = Some(format!("Failed to write transcript: {e}"));
            return outcome;
        }
        outcome.archive_dir = Some(self.archive.host_dir(job_id, &target.id));

        if let Err(e) = self
            .archive
            .write_json(job_id, &target.id, files::TIMING, &collection.timing)
        {
            warn!(job_id, host_id = %target.id, error = %e, "failed to write timing report");
        }

        if collection.success
            && let Err(e) = self.archive_parsed(job_id, target, &collection)
        {
            warn!(job_id, host_id = %target.id, error = %e, "failed to write parsed artifacts");
        }
        outcome
    }

    /// Parse the transcript and write every derived artifact.
    fn archive_parsed(
        &self,
        job_id: &str,
        target: &Target,
        collection: &Collection,
    ) -> Result<(), StoreError> {
        let transcript = &collection.transcript;
        let snapshot = parse_transcript(transcript);
        let health = evaluate(
            &snapshot.config_variables,
            &snapshot.global_status,
            &SystemInfo::with_total_memory(target.total_memory_bytes),
        );
        let host = target.id.as_str();

        self.archive
            .write_text(job_id, host, files::ENGINE_TEXT, &render_engine_status(transcript))?;
        self.archive
            .write_json(job_id, host, files::ENGINE_STATUS, &snapshot.engine_status)?;
        self.archive
            .write_json(job_id, host, files::GLOBAL_STATUS, &snapshot.global_status)?;
        self.archive
            .write_json(job_id, host, files::PROCESS_LIST, &snapshot.processes)?;
        self.archive
            .write_json(job_id, host, files::CONFIG_VARIABLES, &snapshot.config_variables)?;
        self.archive
            .write_json(job_id, host, files::CONFIG_HEALTH, &health)?;
        self.archive
            .write_json(job_id, host, files::REPLICA_STATUS, &snapshot.replication)?;
        self.archive
            .write_json(job_id, host, files::PRIMARY_STATUS, &snapshot.primary)?;

        if snapshot.replication.is_replica {
            info!(
                job_id,
                host_id = host,
                lag_secs = ?snapshot.replication.seconds_behind,
                "replica lag"
            );
        }
        if snapshot.primary.is_primary {
            info!(
                job_id,
                host_id = host,
                file = snapshot.primary.file.as_deref().unwrap_or_default(),
                position = snapshot.primary.position.unwrap_or_default(),
                "binlog position"
            );
        }
        info!(
            job_id,
            host_id = host,
            processes = snapshot.processes.len(),
            counters = snapshot.global_status.len(),
            health = ?band_counts(&health),
            "artifacts archived"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;
    use masc_parse::CommandKind;
    use masc_store::DuckJobStore;

    fn inventory() -> Vec<Target> {
        vec![
            Target::new("db1", "db1.internal", "observer").with_total_memory(1 << 30),
            Target::new("db2", "db2.internal", "observer"),
            Target::new("db3", "db3.internal", "observer").with_label("Reporting replica"),
        ]
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    struct Harness {
        job: CollectionJob,
        store: Arc<DuckJobStore>,
        _dir: tempfile::TempDir,
    }

    fn harness(runner: FakeRunner) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DuckJobStore::open_memory().unwrap());
        let job = CollectionJob::new(
            Arc::new(runner),
            store.clone(),
            RunArchive::new(dir.path()),
            inventory(),
        );
        Harness {
            job,
            store,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_partial_failure_completes_job() {
        let h = harness(FakeRunner::new().failing_target("db2"));
        let summary = h.job.run("job1", &ids(&["db1", "db2", "db3"])).await.unwrap();

        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.hosts_attempted, 3);
        assert_eq!(summary.hosts_succeeded, 2);
        assert_eq!(summary.hosts_failed, 1);
        assert!(summary.results[1].error.as_deref().unwrap().contains("Can't connect"));
        assert_eq!(summary.results[2].label, "Reporting replica");

        let job = h.store.get_job("job1").unwrap().unwrap();
        assert_eq!(job.status, RunStatus::Completed);
        assert!(job.completed_at.is_some());

        let hosts = h.store.list_job_hosts("job1").unwrap();
        let statuses: Vec<RunStatus> = hosts.iter().map(|h| h.status).collect();
        assert_eq!(
            statuses,
            vec![RunStatus::Completed, RunStatus::Failed, RunStatus::Completed]
        );
        assert!(hosts[1].error.is_some());
    }

    #[tokio::test]
    async fn test_artifacts_written() {
        let h = harness(FakeRunner::new().failing_target("db2"));
        h.job.run("job1", &ids(&["db1", "db2"])).await.unwrap();

        let ok_dir = h.job.archive().host_dir("job1", "db1");
        for name in [
            files::RAW,
            files::TIMING,
            files::ENGINE_TEXT,
            files::ENGINE_STATUS,
            files::GLOBAL_STATUS,
            files::PROCESS_LIST,
            files::CONFIG_VARIABLES,
            files::CONFIG_HEALTH,
            files::REPLICA_STATUS,
            files::PRIMARY_STATUS,
        ] {
            assert!(ok_dir.join(name).is_file(), "missing {name}");
        }

        let failed_dir = h.job.archive().host_dir("job1", "db2");
        assert!(failed_dir.join(files::RAW).is_file());
        assert!(failed_dir.join(files::TIMING).is_file());
        assert!(!failed_dir.join(files::GLOBAL_STATUS).exists());

        let raw = h.job.archive().read_raw("job1", "db2").unwrap();
        assert!(raw.contains("-- ERROR: ERROR 2003"));
    }

    #[tokio::test]
    async fn test_archived_health_uses_target_memory() {
        let h = harness(FakeRunner::new());
        h.job.run("job1", &ids(&["db1", "db2"])).await.unwrap();

        let read = |host: &str| -> serde_json::Value {
            let path = h.job.archive().host_dir("job1", host).join(files::CONFIG_HEALTH);
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
        };
        // 128 MiB of a 1 GiB host
        assert_eq!(read("db1")["innodb_buffer_pool_size"]["band"], "critical");
        assert_eq!(read("db2")["innodb_buffer_pool_size"]["band"], "indeterminate");

        let vars_path = h.job.archive().host_dir("job1", "db1").join(files::CONFIG_VARIABLES);
        let vars: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(vars_path).unwrap()).unwrap();
        assert_eq!(vars["version"], "8.0.36");
    }

    #[tokio::test]
    async fn test_unknown_host_fails_only_that_host() {
        let h = harness(FakeRunner::new());
        let summary = h.job.run("job1", &ids(&["ghost", "db1"])).await.unwrap();

        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.results[0].error.as_deref(), Some("Host ghost not found"));
        let hosts = h.store.list_job_hosts("job1").unwrap();
        assert_eq!(hosts[0].status, RunStatus::Failed);
        assert_eq!(hosts[0].error.as_deref(), Some("Host ghost not found"));
    }

    #[tokio::test]
    async fn test_all_hosts_failed_fails_job() {
        let h = harness(FakeRunner::new().failing(CommandKind::EngineStatus, "denied"));
        let summary = h.job.run("job1", &ids(&["db1", "db2"])).await.unwrap();

        assert_eq!(summary.status, RunStatus::Failed);
        assert_eq!(summary.hosts_failed, 2);
        let job = h.store.get_job("job1").unwrap().unwrap();
        assert_eq!(job.status, RunStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("All 2 hosts failed"));
    }

    #[tokio::test]
    async fn test_empty_host_list_fails_job() {
        let h = harness(FakeRunner::new());
        let summary = h.job.run("job1", &[]).await.unwrap();
        assert_eq!(summary.status, RunStatus::Failed);
        assert_eq!(summary.hosts_attempted, 0);
    }

    #[tokio::test]
    async fn test_duplicate_job_id_is_store_error() {
        let h = harness(FakeRunner::new());
        h.job.run("job1", &ids(&["db1"])).await.unwrap();
        let err = h.job.run("job1", &ids(&["db1"])).await.unwrap_err();
        assert!(matches!(err, CollectError::Store(_)));
    }

    /// Delegates to `inner` but refuses any update for `broken_host`.
    struct BrokenHostStore {
        inner: Arc<DuckJobStore>,
        broken_host: &'static str,
    }

    impl JobStore for BrokenHostStore {
        fn create_job(&self, job_id: &str, host_ids: &[String]) -> Result<(), StoreError> {
            self.inner.create_job(job_id, host_ids)
        }

        fn set_job_status(
            &self,
            job_id: &str,
            status: RunStatus,
            error: Option<&str>,
        ) -> Result<(), StoreError> {
            self.inner.set_job_status(job_id, status, error)
        }

        fn set_host_status(
            &self,
            job_id: &str,
            host_id: &str,
            status: RunStatus,
            error: Option<&str>,
        ) -> Result<(), StoreError> {
            if host_id == self.broken_host {
                return Err(StoreError::QueryError("disk full".into()));
            }
            self.inner.set_host_status(job_id, host_id, status, error)
        }

        fn get_job(&self, job_id: &str) -> Result<Option<masc_store::JobRecord>, StoreError> {
            self.inner.get_job(job_id)
        }

        fn list_job_hosts(&self, job_id: &str) -> Result<Vec<masc_store::JobHostRecord>, StoreError> {
            self.inner.list_job_hosts(job_id)
        }

        fn list_jobs(&self, limit: usize) -> Result<Vec<masc_store::JobRecord>, StoreError> {
            self.inner.list_jobs(limit)
        }
    }

    #[tokio::test]
    async fn test_store_failure_mid_job_marks_job_failed() {
        let dir = tempfile::tempdir().unwrap();
        let inner = Arc::new(DuckJobStore::open_memory().unwrap());
        let store = Arc::new(BrokenHostStore {
            inner: inner.clone(),
            broken_host: "db2",
        });
        let job = CollectionJob::new(
            Arc::new(FakeRunner::new()),
            store,
            RunArchive::new(dir.path()),
            inventory(),
        );

        let err = job.run("job1", &ids(&["db1", "db2", "db3"])).await.unwrap_err();
        assert!(matches!(err, CollectError::Store(_)));

        let record = inner.get_job("job1").unwrap().unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("Store error: Query error: disk full"));
        let hosts = inner.list_job_hosts("job1").unwrap();
        assert_eq!(hosts[0].status, RunStatus::Completed);
        assert_eq!(hosts[2].status, RunStatus::Pending);
    }

    #[tokio::test]
    async fn test_sequential_mode_job() {
        let runner = FakeRunner::new();
        let h = harness(runner.clone());
        let job = CollectionJob::new(
            Arc::new(runner),
            h.store.clone(),
            h.job.archive().clone(),
            inventory(),
        )
        .with_mode(CollectionMode::Sequential);

        job.run("job2", &ids(&["db1"])).await.unwrap();
        let raw = job.archive().read_raw("job2", "db1").unwrap();
        assert!(raw.contains("# Mode: Sequential"));
    }
}
