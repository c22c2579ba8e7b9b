//! Structured output
//!
//! Every command that emits data wraps it in an [`Envelope`] so consumers
//! can check the schema before reading `data`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard envelope for structured output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T: Serialize> {
    /// Schema identifier (e.g. "masc.collect.v1")
    pub schema_version: String,

    pub generated_at: DateTime<Utc>,

    pub data: T,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(schema_version: impl Into<String>, data: T) -> Self {
        Self {
            schema_version: schema_version.into(),
            generated_at: Utc::now(),
            data,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn add_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|e| format!(r#"{{"error": "serialization failed: {e}"}}"#))
    }
}

pub mod schema {
    pub const HOSTS: &str = "masc.hosts.v1";
    pub const COLLECT: &str = "masc.collect.v1";
    pub const PARSE: &str = "masc.parse.v1";
    pub const HEALTH: &str = "masc.health.v1";
    pub const JOBS: &str = "masc.jobs.v1";
    pub const CONFIG: &str = "masc.config.v1";
}
