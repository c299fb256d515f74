use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

use super::finding::FindingDraft;
use super::test_case::Priority;
use crate::agents::registry::TesterRole;
use crate::lifecycle::{JobLifecycle, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Typed per-job knobs plus an opaque extension map carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

/// A request to run one test case for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub project_id: String,
    pub test_case_id: String,
    #[serde(flatten)]
    pub options: JobOptions,
}

impl JobRequest {
    pub fn new(project_id: impl Into<String>, test_case_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            test_case_id: test_case_id.into(),
            options: JobOptions::default(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.options.priority = Some(priority);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.options.max_retries = Some(max_retries);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.options.timeout_secs = Some(secs);
        self
    }
}

/// What a tester delivers at the end of an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobReport {
    Completed {
        #[serde(default)]
        result: Value,
        #[serde(default)]
        findings: Vec<FindingDraft>,
    },
    Failed {
        error: String,
        /// Transient failures go through the retry policy; others are final.
        #[serde(default)]
        retryable: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_type: Option<String>,
    },
}

impl JobReport {
    pub fn from_error(err: &crate::errors::ApexError) -> Self {
        let class = err.classify();
        JobReport::Failed {
            error: err.to_string(),
            retryable: class.retryable,
            error_type: Some(class.error_type.to_string()),
        }
    }
}

/// Scheduler-owned job record.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub project_id: String,
    pub test_case_id: String,
    pub role: TesterRole,
    pub priority: Priority,
    pub timeout: Duration,
    pub metadata: BTreeMap<String, Value>,
    pub lifecycle: JobLifecycle,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error_message: Option<String>,
    pub failure_reason: Option<String>,
    pub cancel_requested: bool,
    /// Monotonic instants used for deadlines, backoff and duration samples.
    pub started_instant: Option<Instant>,
    pub deadline: Option<Instant>,
    pub retry_at: Option<Instant>,
}

impl Job {
    pub fn status(&self) -> JobStatus {
        self.lifecycle.current_status()
    }

    pub fn generation(&self) -> u64 {
        self.lifecycle.generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_request_flattened_options() {
        let req: JobRequest = serde_json::from_value(json!({
            "project_id": "p1",
            "test_case_id": "WSTG-INPV-05",
            "priority": 4,
            "metadata": {"wordlist": "small"}
        }))
        .unwrap();
        assert_eq!(req.options.priority, Some(4));
        assert_eq!(req.options.max_retries, None);
        assert_eq!(req.options.metadata["wordlist"], json!("small"));
    }

    #[test]
    fn test_job_report_tagged() {
        let report: JobReport = serde_json::from_value(json!({
            "status": "failed",
            "error": "connection reset",
            "retryable": true
        }))
        .unwrap();
        assert!(matches!(report, JobReport::Failed { retryable: true, .. }));
    }

    #[test]
    fn test_job_id_parse() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }
}
