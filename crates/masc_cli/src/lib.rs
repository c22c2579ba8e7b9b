//! masc_cli - Command-line interface for masc
//!
//! This crate provides:
//! - clap-based command definitions
//! - Structured output in a versioned JSON envelope
//! - Dispatch of every subcommand to the library crates

use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use masc_collect::{CollectionJob, JobSummary};
use masc_config::{CollectionMode, MascConfig};
use masc_health::{HealthBand, SystemInfo, band_counts, evaluate};
use masc_parse::{CommandKind, ParsedSnapshot, ProcessFilter, filter_processes, parse_transcript};
use masc_store::{DuckJobStore, JobStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub mod output;

pub use output::Envelope;
use output::schema;

/// CLI errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Config error: {0}")]
    ConfigError(#[from] masc_config::ConfigError),

    #[error("Store error: {0}")]
    StoreError(#[from] masc_store::StoreError),

    #[error("Collection error: {0}")]
    CollectError(#[from] masc_collect::CollectError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Enveloped JSON
    Json,
    /// Human-readable text
    Text,
}

/// Main CLI application
#[derive(Parser, Debug)]
#[command(name = "masc")]
#[command(author, version, about = "MySQL diagnostic snapshot collector")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for commands
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the configured hosts
    Hosts,

    /// Collect diagnostics from hosts
    Collect {
        /// Host id to collect from (repeatable); all hosts when omitted
        #[arg(long = "host")]
        hosts: Vec<String>,

        /// Job identifier; generated from the current time when omitted
        #[arg(long)]
        job_id: Option<String>,

        /// Run commands one at a time instead of concurrently
        #[arg(long)]
        sequential: bool,
    },

    /// Re-parse a saved raw transcript
    Parse {
        /// Path to raw.txt
        raw: PathBuf,

        /// Section to print
        #[arg(long, value_enum, default_value = "all")]
        section: SectionArg,

        #[command(flatten)]
        filter: ProcessFilterArgs,
    },

    /// Evaluate configuration health from a saved raw transcript
    Health {
        /// Path to raw.txt
        raw: PathBuf,

        /// Host RAM in bytes, for the buffer pool rule
        #[arg(long)]
        total_memory: Option<u64>,
    },

    /// Show recent jobs
    Jobs {
        /// Maximum number of jobs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Load and validate the configuration
    Validate,
    /// Print the effective configuration, passwords redacted
    Show,
}

/// Process list filters, applied when `--section processlist` is chosen
#[derive(Args, Debug, Default)]
pub struct ProcessFilterArgs {
    /// Only processes whose user contains this text
    #[arg(long)]
    pub user: Option<String>,

    /// Only processes whose state contains this text
    #[arg(long)]
    pub state: Option<String>,

    /// Only processes running at least this many seconds
    #[arg(long)]
    pub min_time: Option<i64>,

    /// Only processes whose query contains this text
    #[arg(long)]
    pub query: Option<String>,
}

impl From<ProcessFilterArgs> for ProcessFilter {
    fn from(args: ProcessFilterArgs) -> Self {
        Self {
            user: args.user,
            state: args.state,
            min_time: args.min_time,
            query: args.query,
        }
    }
}

/// Section selector for `parse`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SectionArg {
    Engine,
    Status,
    Processlist,
    Variables,
    Replica,
    Primary,
    All,
}

impl SectionArg {
    fn kind(self) -> Option<CommandKind> {
        match self {
            Self::Engine => Some(CommandKind::EngineStatus),
            Self::Status => Some(CommandKind::GlobalStatus),
            Self::Processlist => Some(CommandKind::ProcessList),
            Self::Variables => Some(CommandKind::GlobalVariables),
            Self::Replica => Some(CommandKind::ReplicaStatus),
            Self::Primary => Some(CommandKind::PrimaryStatus),
            Self::All => None,
        }
    }
}

impl Cli {
    /// Load configuration from `--config` or the standard locations
    ///
    /// # Errors
    ///
    /// Returns [`CliError::ConfigError`] when loading or validation fails.
    pub fn load_config(&self) -> Result<MascConfig, CliError> {
        let config = match &self.config {
            Some(path) => MascConfig::load_with_env(path)?,
            None => MascConfig::discover_with_env()?,
        };
        Ok(config)
    }

    /// Run the selected command with an already-loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CliError`] on configuration, store, or file errors. A job
    /// in which every host failed is reported as [`CliError::CommandFailed`]
    /// after its summary is printed.
    pub async fn run(self, config: MascConfig) -> Result<(), CliError> {
        let format = self.format;
        match self.command {
            Commands::Hosts => {
                let hosts: Vec<HostView> = config.hosts.iter().map(HostView::from).collect();
                match format {
                    OutputFormat::Json => emit(schema::HOSTS, &hosts),
                    OutputFormat::Text => {
                        if hosts.is_empty() {
                            println!("No hosts configured");
                        }
                        for host in &hosts {
                            println!("{:<16} {:<32} {}@{}", host.id, host.label, host.user, host.address);
                        }
                    }
                }
            }
            Commands::Collect {
                hosts,
                job_id,
                sequential,
            } => {
                let summary = collect(&config, hosts, job_id, sequential).await?;
                match format {
                    OutputFormat::Json => emit(schema::COLLECT, &summary),
                    OutputFormat::Text => print_summary(&summary),
                }
                if summary.status == masc_store::RunStatus::Failed {
                    return Err(CliError::CommandFailed(format!(
                        "Job {} failed: no host succeeded",
                        summary.job_id
                    )));
                }
            }
            Commands::Parse {
                raw,
                section,
                filter,
            } => {
                let snapshot = parse_file(&raw)?;
                let warnings = passthrough_warnings(&snapshot, section.kind());
                let data = section_value(&snapshot, section, &filter.into())
                    .map_err(|e| CliError::CommandFailed(e.to_string()))?;
                let envelope = Envelope::new(schema::PARSE, data).with_warnings(warnings);
                print_envelope(&envelope, format);
            }
            Commands::Health { raw, total_memory } => {
                let snapshot = parse_file(&raw)?;
                let report = evaluate(
                    &snapshot.config_variables,
                    &snapshot.global_status,
                    &SystemInfo::with_total_memory(total_memory),
                );
                match format {
                    OutputFormat::Json => emit(schema::HEALTH, &report),
                    OutputFormat::Text => {
                        for (name, entry) in &report {
                            println!(
                                "{:<14} {:<34} {:<16} {}",
                                entry.band.as_str(),
                                name,
                                entry.value,
                                entry.reason
                            );
                        }
                        let counts = band_counts(&report);
                        let count = |band: HealthBand| counts.get(&band).copied().unwrap_or(0);
                        println!(
                            "\n{} healthy, {} warning, {} critical, {} indeterminate",
                            count(HealthBand::Healthy),
                            count(HealthBand::Warning),
                            count(HealthBand::Critical),
                            count(HealthBand::Indeterminate)
                        );
                    }
                }
            }
            Commands::Jobs { limit } => {
                let store = DuckJobStore::open(&config.global.db_path)?;
                let jobs = store.list_jobs(limit)?;
                match format {
                    OutputFormat::Json => emit(schema::JOBS, &jobs),
                    OutputFormat::Text => {
                        if jobs.is_empty() {
                            println!("No jobs recorded");
                        }
                        for job in &jobs {
                            println!(
                                "{:<24} {:<10} {} {}",
                                job.job_id,
                                job.status.as_str(),
                                job.created_at,
                                job.error.as_deref().unwrap_or("")
                            );
                        }
                    }
                }
            }
            Commands::Config { command } => match command {
                ConfigCommands::Validate => {
                    config.validate()?;
                    match format {
                        OutputFormat::Json => emit(
                            schema::CONFIG,
                            &serde_json::json!({ "valid": true, "hosts": config.hosts.len() }),
                        ),
                        OutputFormat::Text => {
                            println!("Configuration is valid ({} hosts)", config.hosts.len());
                        }
                    }
                }
                ConfigCommands::Show => {
                    let redacted = redact(config);
                    match format {
                        OutputFormat::Json => emit(schema::CONFIG, &redacted),
                        OutputFormat::Text => {
                            let text = toml::to_string_pretty(&redacted)
                                .map_err(|e| CliError::CommandFailed(e.to_string()))?;
                            print!("{text}");
                        }
                    }
                }
            },
        }
        Ok(())
    }
}

/// Host inventory entry without credentials
#[derive(Debug, Clone, Serialize)]
struct HostView {
    id: String,
    label: String,
    address: String,
    user: String,
    total_memory_bytes: Option<u64>,
}

impl From<&masc_config::Target> for HostView {
    fn from(target: &masc_config::Target) -> Self {
        Self {
            id: target.id.clone(),
            label: target.display_name().to_string(),
            address: target.address(),
            user: target.user.clone(),
            total_memory_bytes: target.total_memory_bytes,
        }
    }
}

async fn collect(
    config: &MascConfig,
    hosts: Vec<String>,
    job_id: Option<String>,
    sequential: bool,
) -> Result<JobSummary, CliError> {
    let host_ids: Vec<String> = if hosts.is_empty() {
        config.hosts.iter().map(|t| t.id.clone()).collect()
    } else {
        // Repeated --host flags collect once.
        let mut seen = std::collections::HashSet::new();
        hosts.into_iter().filter(|id| seen.insert(id.clone())).collect()
    };
    let job_id = job_id.unwrap_or_else(default_job_id);

    let store: Arc<dyn JobStore> = Arc::new(DuckJobStore::open(&config.global.db_path)?);
    let mut job = CollectionJob::from_config(config, store);
    if sequential {
        job = job.with_mode(CollectionMode::Sequential);
    }

    info!(job_id = %job_id, hosts = host_ids.len(), "Running collection job");
    Ok(job.run(&job_id, &host_ids).await?)
}

fn default_job_id() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn parse_file(path: &Path) -> Result<ParsedSnapshot, CliError> {
    let transcript = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), bytes = transcript.len(), "Parsing transcript");
    Ok(parse_transcript(&transcript))
}

fn passthrough_warnings(snapshot: &ParsedSnapshot, only: Option<CommandKind>) -> Vec<String> {
    snapshot
        .passthrough_sections()
        .filter(|kind| only.is_none_or(|k| k == *kind))
        .map(|kind| format!("{} section not found; parsed the whole transcript", kind.sql()))
        .collect()
}

fn section_value(
    snapshot: &ParsedSnapshot,
    section: SectionArg,
    filter: &ProcessFilter,
) -> Result<serde_json::Value, serde_json::Error> {
    match section {
        SectionArg::Engine => serde_json::to_value(&snapshot.engine_status),
        SectionArg::Status => serde_json::to_value(&snapshot.global_status),
        SectionArg::Processlist => {
            serde_json::to_value(filter_processes(&snapshot.processes, filter))
        }
        SectionArg::Variables => serde_json::to_value(&snapshot.config_variables),
        SectionArg::Replica => serde_json::to_value(&snapshot.replication),
        SectionArg::Primary => serde_json::to_value(&snapshot.primary),
        SectionArg::All => serde_json::to_value(snapshot),
    }
}

fn redact(mut config: MascConfig) -> MascConfig {
    for target in &mut config.hosts {
        if !target.password.is_empty() {
            target.password = "<redacted>".to_string();
        }
    }
    config
}

fn print_summary(summary: &JobSummary) {
    println!(
        "Job {}: {} ({}/{} hosts succeeded, {:.2}s)",
        summary.job_id,
        summary.status,
        summary.hosts_succeeded,
        summary.hosts_attempted,
        summary.total_duration
    );
    for host in &summary.results {
        let state = if host.success { "ok" } else { "FAILED" };
        print!("  {:<16} {:<7} {:>7.2}s", host.host_id, state, host.duration);
        if let Some(error) = &host.error {
            print!("  {error}");
        }
        if let Some(dir) = &host.archive_dir {
            print!("  {}", dir.display());
        }
        println!();
    }
}

fn emit<T: Serialize>(schema_version: &str, data: &T) {
    println!("{}", Envelope::new(schema_version, data).to_json_pretty());
}

fn print_envelope<T: Serialize>(envelope: &Envelope<T>, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", envelope.to_json_pretty()),
        OutputFormat::Text => {
            for warning in &envelope.warnings {
                eprintln!("warning: {warning}");
            }
            let body = serde_json::to_string_pretty(&envelope.data)
                .unwrap_or_else(|e| format!(r#"{{"error": "serialization failed: {e}"}}"#));
            println!("{body}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use masc_config::Target;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_collect_args() {
        let cli = Cli::parse_from([
            "masc", "collect", "--host", "db1", "--host", "db2", "--job-id", "nightly",
            "--sequential",
        ]);
        match cli.command {
            Commands::Collect {
                hosts,
                job_id,
                sequential,
            } => {
                assert_eq!(hosts, vec!["db1", "db2"]);
                assert_eq!(job_id.as_deref(), Some("nightly"));
                assert!(sequential);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_collect_defaults() {
        let cli = Cli::parse_from(["masc", "collect"]);
        match cli.command {
            Commands::Collect {
                hosts,
                job_id,
                sequential,
            } => {
                assert!(hosts.is_empty());
                assert!(job_id.is_none());
                assert!(!sequential);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "masc", "parse", "raw.txt", "--section", "processlist", "--format", "json", "-v",
            "--config", "/tmp/masc.toml",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/masc.toml")));
        match cli.command {
            Commands::Parse {
                raw,
                section,
                filter,
            } => {
                assert_eq!(raw, PathBuf::from("raw.txt"));
                assert_eq!(section, SectionArg::Processlist);
                assert!(filter.user.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_health_args() {
        let cli = Cli::parse_from(["masc", "health", "raw.txt", "--total-memory", "8589934592"]);
        match cli.command {
            Commands::Health { total_memory, .. } => assert_eq!(total_memory, Some(8_589_934_592)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(Cli::try_parse_from(["masc", "parse", "raw.txt", "--section", "binlog"]).is_err());
    }

    #[test]
    fn test_section_kinds() {
        assert_eq!(SectionArg::Engine.kind(), Some(CommandKind::EngineStatus));
        assert_eq!(SectionArg::Primary.kind(), Some(CommandKind::PrimaryStatus));
        assert_eq!(SectionArg::All.kind(), None);
    }

    #[test]
    fn test_host_view_hides_password() {
        let target = Target::new("db1", "db1.internal", "observer").with_password("hunter2");
        let json = serde_json::to_string(&HostView::from(&target)).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("db1.internal:3306"));
    }

    #[test]
    fn test_redact_replaces_passwords() {
        let mut config = MascConfig::default();
        config.hosts.push(Target::new("db1", "h", "u").with_password("secret"));
        config.hosts.push(Target::new("db2", "h", "u"));
        let redacted = redact(config);
        assert_eq!(redacted.hosts[0].password, "<redacted>");
        assert_eq!(redacted.hosts[1].password, "");
    }

    #[test]
    fn test_passthrough_warnings_filtered_by_section() {
        let snapshot = parse_transcript("no banners here");
        let all = passthrough_warnings(&snapshot, None);
        assert_eq!(all.len(), 6);
        let one = passthrough_warnings(&snapshot, Some(CommandKind::GlobalStatus));
        assert_eq!(one, vec!["SHOW GLOBAL STATUS section not found; parsed the whole transcript"]);
    }

    #[test]
    fn test_section_value_selects_field() {
        let snapshot = parse_transcript("Variable_name\tValue\nThreads_connected\t3\n");
        let none = ProcessFilter::default();
        let value = section_value(&snapshot, SectionArg::Status, &none).unwrap();
        assert_eq!(value["Threads_connected"], 3);
        let all = section_value(&snapshot, SectionArg::All, &none).unwrap();
        assert!(all.get("engine_status").is_some());
    }

    #[test]
    fn test_processlist_filter_args() {
        let cli = Cli::parse_from([
            "masc", "parse", "raw.txt", "--section", "processlist", "--user", "app",
            "--min-time", "30",
        ]);
        let Commands::Parse { filter, .. } = cli.command else {
            panic!("expected parse");
        };
        let filter = ProcessFilter::from(filter);
        assert_eq!(filter.user.as_deref(), Some("app"));
        assert_eq!(filter.min_time, Some(30));

        let snapshot = parse_transcript(
            "Id\tUser\tHost\tdb\tCommand\tTime\tState\tInfo\n\
             1\tapp\th\tNULL\tQuery\t45\tSending data\tSELECT 1\n\
             2\tapp\th\tNULL\tSleep\t5\t\tNULL\n\
             3\troot\th\tNULL\tQuery\t90\tinit\tSELECT 2\n",
        );
        let value = section_value(&snapshot, SectionArg::Processlist, &filter).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], 1);
    }

    #[test]
    fn test_cli_error_display() {
        let err = CliError::CommandFailed("timeout".to_string());
        assert_eq!(err.to_string(), "Command failed: timeout");
    }

    #[test]
    fn test_default_job_id_shape() {
        let id = default_job_id();
        assert_eq!(id.len(), 15);
        assert_eq!(&id[8..9], "_");
    }

    #[tokio::test]
    async fn test_collect_records_job() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MascConfig::default();
        config.global.db_path = dir.path().join("masc.duckdb");
        config.global.runs_dir = dir.path().join("runs");
        config.collector.client = "masc-test-missing-client".to_string();
        config.collector.timeout_secs = 5;
        config.hosts.push(Target::new("db1", "127.0.0.1", "observer"));

        let summary = collect(&config, vec![], Some("j1".into()), true).await.unwrap();
        assert_eq!(summary.status, masc_store::RunStatus::Failed);
        assert!(
            summary.results[0]
                .error
                .as_deref()
                .unwrap()
                .contains("CLI not found")
        );

        let store = DuckJobStore::open(&config.global.db_path).unwrap();
        let job = store.get_job("j1").unwrap().unwrap();
        assert_eq!(job.status, masc_store::RunStatus::Failed);
    }
}
