//! Running one diagnostic command through the external client.
//!
//! Every invocation is a fresh process: `<client> -h<host> -P<port> -u<user> -e <sql>`
//! with the credential in `MYSQL_PWD`. Failures are returned as values, never
//! as errors, so one bad command cannot take down a collection.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use masc_config::{CollectorConfig, Target};
use masc_parse::CommandKind;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;
use tracing::{debug, info, instrument, warn};

/// How long reader tasks may keep draining after a failed wait or a kill
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Advisory the client prints when a password is supplied on the command line
const PASSWORD_ADVISORY: &str = "Using a password";

/// Outcome of one command against one target
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub kind: CommandKind,
    pub success: bool,
    /// Client stdout; empty when the command failed
    pub output: String,
    pub error: Option<String>,
    pub duration: Duration,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// Child process id, when the client was spawned
    pub pid: Option<u32>,
}

impl CommandResult {
    #[must_use]
    pub fn succeeded(
        kind: CommandKind,
        output: impl Into<String>,
        started_at: DateTime<Local>,
        duration: Duration,
    ) -> Self {
        Self {
            kind,
            success: true,
            output: output.into(),
            error: None,
            duration,
            started_at,
            finished_at: Local::now(),
            pid: None,
        }
    }

    #[must_use]
    pub fn failed(
        kind: CommandKind,
        error: impl Into<String>,
        started_at: DateTime<Local>,
        duration: Duration,
    ) -> Self {
        Self {
            kind,
            success: false,
            output: String::new(),
            error: Some(error.into()),
            duration,
            started_at,
            finished_at: Local::now(),
            pid: None,
        }
    }

    #[must_use]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Text written under the command's banner in a transcript
    #[must_use]
    pub fn body(&self) -> String {
        match &self.error {
            Some(error) if !self.success => format!("-- ERROR: {error}"),
            _ => self.output.clone(),
        }
    }
}

/// Runs a single diagnostic command against a target
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, target: &Target, kind: CommandKind) -> CommandResult;
}

/// Runner backed by the external command-line client
#[derive(Debug, Clone)]
pub struct ClientRunner {
    client: String,
    timeout: Duration,
}

impl Default for ClientRunner {
    fn default() -> Self {
        Self::from_config(&CollectorConfig::default())
    }
}

impl ClientRunner {
    #[must_use]
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            timeout: Duration::from_secs(CollectorConfig::default().timeout_secs),
        }
    }

    #[must_use]
    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::new(config.client.clone()).with_timeout(Duration::from_secs(config.timeout_secs))
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn client(&self) -> &str {
        &self.client
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command(&self, target: &Target, kind: CommandKind) -> Command {
        let mut cmd = Command::new(&self.client);
        cmd.arg(format!("-h{}", target.host))
            .arg(format!("-P{}", target.port))
            .arg(format!("-u{}", target.user))
            .arg("-e")
            .arg(kind.sql())
            .env("MYSQL_PWD", &target.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, error: &std::io::Error) -> String {
        if error.kind() == ErrorKind::NotFound {
            format!("{} CLI not found", self.client)
        } else {
            error.to_string()
        }
    }
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe
            && let Err(e) = pipe.read_to_end(&mut buf).await
        {
            debug!(error = %e, "pipe read ended early");
        }
        buf
    })
}

/// Collect a reader task's bytes, or `None` when `deadline` passes first.
/// An expired reader is aborted.
async fn collect_output(task: JoinHandle<Vec<u8>>, deadline: TokioInstant) -> Option<String> {
    let abort = task.abort_handle();
    match tokio::time::timeout_at(deadline, task).await {
        Ok(joined) => Some(String::from_utf8_lossy(&joined.unwrap_or_default()).into_owned()),
        Err(_) => {
            abort.abort();
            None
        }
    }
}

/// Decide success from the exit status and captured streams.
///
/// A non-zero exit still counts as success when the password advisory is the
/// only thing on stderr.
fn classify(exited_ok: bool, stdout: String, stderr: &str) -> Result<String, String> {
    if exited_ok || advisory_only(stderr) {
        return Ok(stdout);
    }
    let message = stderr.trim();
    if message.is_empty() {
        Err("Unknown error".to_string())
    } else {
        Err(message.to_string())
    }
}

fn advisory_only(stderr: &str) -> bool {
    let mut saw_advisory = false;
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        if line.contains(PASSWORD_ADVISORY) {
            saw_advisory = true;
        } else {
            return false;
        }
    }
    saw_advisory
}

#[async_trait]
impl CommandRunner for ClientRunner {
    #[instrument(skip(self, target), fields(host_id = %target.id, command = %kind))]
    async fn run(&self, target: &Target, kind: CommandKind) -> CommandResult {
        let started_at = Local::now();
        let clock = Instant::now();

        let mut child = match self.command(target, kind).spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = self.spawn_error(&e);
                warn!(client = %self.client, error = %e, "failed to start client");
                return CommandResult::failed(kind, message, started_at, clock.elapsed());
            }
        };

        let pid = child.id();
        info!(pid, label = %target.display_name(), command = %kind, "DB CONNECT");

        let stdout_task = drain(child.stdout.take());
        let stderr_task = drain(child.stderr.take());

        // One budget for the wait and both drains: a descendant that keeps
        // the pipes open after the client exits still counts as hanging.
        let deadline = TokioInstant::now() + self.timeout;
        let timed_out = || format!("Command timed out after {}s", self.timeout.as_secs());

        let waited = tokio::time::timeout_at(deadline, child.wait()).await;
        let (status, stdout, stderr) = match waited {
            Ok(Ok(exit)) => {
                let stdout = collect_output(stdout_task, deadline).await;
                let stderr = collect_output(stderr_task, deadline).await;
                match (stdout, stderr) {
                    (Some(stdout), Some(stderr)) => (Ok(exit.success()), stdout, stderr),
                    _ => {
                        warn!(pid, "client exited but its output pipes stayed open");
                        (Err(timed_out()), String::new(), String::new())
                    }
                }
            }
            waited => {
                let status = match waited {
                    Ok(Err(e)) => Err(e.to_string()),
                    _ => {
                        if let Err(e) = child.kill().await {
                            warn!(pid, error = %e, "failed to kill timed out client");
                        }
                        Err(timed_out())
                    }
                };
                let grace = TokioInstant::now() + DRAIN_GRACE;
                let stdout = collect_output(stdout_task, grace).await.unwrap_or_default();
                let stderr = collect_output(stderr_task, grace).await.unwrap_or_default();
                (status, stdout, stderr)
            }
        };
        let duration = clock.elapsed();

        let result = match status.and_then(|exited_ok| classify(exited_ok, stdout, &stderr)) {
            Ok(output) => CommandResult::succeeded(kind, output, started_at, duration),
            Err(error) => CommandResult::failed(kind, error, started_at, duration),
        }
        .with_pid(pid);

        info!(
            pid,
            status = if result.success { "ok" } else { "failed" },
            duration_secs = duration.as_secs_f64(),
            "DB DISCONNECT"
        );
        result
    }
}
