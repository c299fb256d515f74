//! Turns a project's scope into an ordered list of job requests.

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agents::TesterRole;
use crate::catalog::Catalog;
use crate::config::PlannerConfig;
use crate::errors::ApexError;
use crate::models::{Credential, JobRequest, Priority, Project, Target, TestCase};

/// Restricts a plan to specific catalog entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanRequest {
    pub test_cases: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedJob {
    pub request: JobRequest,
    pub title: String,
    pub category: String,
    pub role: TesterRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseSummary {
    pub category: String,
    pub test_cases: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub project_id: String,
    pub in_scope_targets: usize,
    pub jobs: Vec<PlannedJob>,
    /// Categories in order of first appearance in `jobs`.
    pub phases: Vec<PhaseSummary>,
    pub estimated_duration_minutes: u64,
}

impl Plan {
    pub fn requests(&self) -> Vec<JobRequest> {
        self.jobs.iter().map(|j| j.request.clone()).collect()
    }
}

/// Effective priority for a test case within a project.
pub fn effective_priority(
    case: &TestCase,
    project: &Project,
    in_scope_targets: usize,
    config: &PlannerConfig,
) -> Priority {
    if let Some(p) = project.settings.test_case_priorities.get(&case.id) {
        return *p;
    }
    if let Some(p) = project.settings.priority_override {
        return p;
    }
    let mut value = case.base_priority.get() as i32;
    if case.is_target_facing() && in_scope_targets >= config.target_boost_threshold {
        value += 1;
    }
    Priority::clamped(value)
}

/// Select applicable test cases and emit prioritized job requests.
///
/// Ordering is effective priority descending, then catalog order. The
/// function has no side effects; identical inputs give identical plans.
pub fn generate_plan(
    project: &Project,
    targets: &[Target],
    credentials: &[Credential],
    catalog: &Catalog,
    request: &PlanRequest,
    config: &PlannerConfig,
) -> Result<Plan, ApexError> {
    if project.id.trim().is_empty() {
        return Err(ApexError::Validation("project id must not be empty".into()));
    }

    let in_scope = targets.iter().filter(|t| t.in_scope()).count();
    if in_scope == 0 {
        return Err(ApexError::InvalidScope(format!(
            "project '{}' has no in-scope targets",
            project.id
        )));
    }
    let usable_credentials = credentials.iter().filter(|c| c.usable(targets)).count();

    let requested: Option<HashSet<&str>> = match &request.test_cases {
        Some(ids) => {
            for id in ids {
                let case = catalog
                    .get(id)
                    .ok_or_else(|| ApexError::UnknownTestCase(id.clone()))?;
                if !case.automatable {
                    return Err(ApexError::Validation(format!(
                        "{} is a manual test case and cannot be scheduled",
                        id
                    )));
                }
                if case.requires_credential() && usable_credentials == 0 {
                    return Err(ApexError::MissingCredential(format!(
                        "{} requires a usable credential for project '{}'",
                        id, project.id
                    )));
                }
            }
            Some(ids.iter().map(String::as_str).collect())
        }
        None => None,
    };

    let mut selected: Vec<(Priority, &TestCase)> = Vec::new();
    for case in catalog.iter() {
        if let Some(ref ids) = requested {
            if !ids.contains(case.id.as_str()) {
                continue;
            }
        }
        if !case.automatable {
            debug!(test_case = %case.id, "Skipping manual test case");
            continue;
        }
        if case.requires_credential() && usable_credentials == 0 {
            debug!(test_case = %case.id, "Skipping test case without usable credential");
            continue;
        }
        let priority = effective_priority(case, project, in_scope, config);
        selected.push((priority, case));
    }

    // Stable: equal priorities keep catalog order.
    selected.sort_by_key(|(priority, _)| Reverse(*priority));

    let jobs: Vec<PlannedJob> = selected
        .into_iter()
        .map(|(priority, case)| PlannedJob {
            request: JobRequest::new(project.id.clone(), case.id.clone()).with_priority(priority.get()),
            title: case.title.clone(),
            category: case.category.clone(),
            role: case.role,
        })
        .collect();

    let mut phases: Vec<PhaseSummary> = Vec::new();
    for job in &jobs {
        match phases.iter_mut().find(|p| p.category == job.category) {
            Some(phase) => phase.test_cases.push(job.request.test_case_id.clone()),
            None => phases.push(PhaseSummary {
                category: job.category.clone(),
                test_cases: vec![job.request.test_case_id.clone()],
            }),
        }
    }

    info!(
        project_id = %project.id,
        jobs = jobs.len(),
        in_scope_targets = in_scope,
        credentials = usable_credentials,
        "Plan generated"
    );

    Ok(Plan {
        project_id: project.id.clone(),
        in_scope_targets: in_scope,
        estimated_duration_minutes: jobs.len() as u64 * config.minutes_per_job,
        jobs,
        phases,
    })
}
