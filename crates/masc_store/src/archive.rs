//! On-disk run archive: `<runs_dir>/job_<job_id>/<host_id>/<artifact>`.

use crate::StoreError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Artifact file names
pub mod files {
    pub const RAW: &str = "raw.txt";
    pub const TIMING: &str = "timing.json";
    pub const ENGINE_TEXT: &str = "innodb.txt";
    pub const ENGINE_STATUS: &str = "engine_status.json";
    pub const GLOBAL_STATUS: &str = "global_status.json";
    pub const PROCESS_LIST: &str = "processlist.json";
    pub const CONFIG_VARIABLES: &str = "config_vars.json";
    pub const CONFIG_HEALTH: &str = "config_health.json";
    pub const REPLICA_STATUS: &str = "replica_status.json";
    pub const PRIMARY_STATUS: &str = "master_status.json";
}

#[derive(Debug, Clone)]
pub struct RunArchive {
    runs_dir: PathBuf,
}

impl RunArchive {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: runs_dir.into(),
        }
    }

    #[must_use]
    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    #[must_use]
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.runs_dir.join(format!("job_{job_id}"))
    }

    #[must_use]
    pub fn host_dir(&self, job_id: &str, host_id: &str) -> PathBuf {
        self.job_dir(job_id).join(host_id)
    }

    /// Write a text artifact, creating the host directory as needed.
    pub fn write_text(
        &self,
        job_id: &str,
        host_id: &str,
        name: &str,
        contents: &str,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.host_dir(job_id, host_id);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(name);
        std::fs::write(&path, contents)?;
        debug!(path = %path.display(), bytes = contents.len(), "artifact written");
        Ok(path)
    }

    /// Write a pretty-printed JSON artifact.
    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        job_id: &str,
        host_id: &str,
        name: &str,
        value: &T,
    ) -> Result<PathBuf, StoreError> {
        let json = serde_json::to_string_pretty(value)?;
        self.write_text(job_id, host_id, name, &json)
    }

    /// The raw transcript of one host in one job
    pub fn read_raw(&self, job_id: &str, host_id: &str) -> Result<String, StoreError> {
        let path = self.host_dir(job_id, host_id).join(files::RAW);
        if !path.exists() {
            return Err(StoreError::NotFound(path.display().to_string()));
        }
        Ok(std::fs::read_to_string(path)?)
    }

    /// Host ids with an archived transcript for `job_id`, sorted
    pub fn list_hosts(&self, job_id: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.job_dir(job_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut hosts = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.path().join(files::RAW).is_file() {
                hosts.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        hosts.sort();
        Ok(hosts)
    }
}
