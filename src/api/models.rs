use serde::{Deserialize, Serialize};

use crate::agents::Assignment;
use crate::lifecycle::JobStatus;
use crate::models::{FindingStatus, JobId, JobReport, ProjectFile, TestCase};
use std::collections::BTreeMap;

#[derive(Deserialize)]
pub struct PlanBody {
    #[serde(flatten)]
    pub project: ProjectFile,
    #[serde(default)]
    pub test_cases: Option<Vec<String>>,
    /// Enqueue the generated jobs instead of only returning the plan.
    #[serde(default)]
    pub submit: bool,
}

#[derive(Deserialize, Default)]
pub struct JobListQuery {
    pub project_id: Option<String>,
    pub status: Option<JobStatus>,
}

#[derive(Deserialize, Default)]
pub struct FindingListQuery {
    pub project_id: Option<String>,
    pub status: Option<FindingStatus>,
}

#[derive(Deserialize, Default)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct HeartbeatBody {
    pub generation: u64,
}

#[derive(Deserialize)]
pub struct ReportBody {
    pub generation: u64,
    #[serde(default)]
    pub tester_id: Option<String>,
    pub report: JobReport,
}

#[derive(Deserialize)]
pub struct FindingStatusBody {
    pub status: FindingStatus,
}

#[derive(Deserialize)]
pub struct ProjectLimitBody {
    pub max_concurrency: usize,
}

/// Wire form of an assignment handed to a pull-mode tester.
#[derive(Serialize)]
pub struct AssignmentResponse {
    pub job_id: JobId,
    pub generation: u64,
    pub project_id: String,
    pub test_case: TestCase,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub timeout_secs: u64,
}

impl From<Assignment> for AssignmentResponse {
    fn from(a: Assignment) -> Self {
        Self {
            job_id: a.job_id,
            generation: a.generation,
            project_id: a.project_id,
            test_case: a.test_case,
            metadata: a.metadata,
            timeout_secs: a.timeout.as_secs(),
        }
    }
}
