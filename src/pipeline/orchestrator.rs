use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::agents::{Assignment, Tester, TesterRegistry, TesterRole};
use crate::audit::AuditTrail;
use crate::catalog::Catalog;
use crate::config::ApexConfig;
use crate::consensus::{ConsensusEngine, Decision, FindingDetail, VoteOutcome};
use crate::errors::ApexError;
use crate::events::EventPublisher;
use crate::lifecycle::{JobStatus, TransitionRecord};
use crate::models::{Finding, FindingId, FindingStatus, JobId, JobReport, JobRequest, ProjectFile, VoteDraft};
use crate::planner::{generate_plan, Plan, PlanRequest};
use crate::scheduler::{CancelOutcome, HeartbeatAck, JobScheduler, JobView, ProjectStatus, ReportOutcome};

/// What happened to a delivered report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedPlan {
    #[serde(flatten)]
    pub plan: Plan,
    pub job_ids: Vec<JobId>,
}

/// Shared handle over the scheduler, the consensus engine and the tester registry.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<ApexConfig>,
    catalog: Arc<Catalog>,
    scheduler: Arc<Mutex<JobScheduler>>,
    consensus: Arc<ConsensusEngine>,
    events: EventPublisher,
    testers: TesterRegistry,
    wake: Arc<Notify>,
}

impl Orchestrator {
    pub fn new(config: ApexConfig, catalog: Catalog, testers: TesterRegistry, audit: AuditTrail) -> Self {
        let config = Arc::new(config);
        let catalog = Arc::new(catalog);
        let events = EventPublisher::new(&config.events);
        let audit_enabled = audit.is_enabled();
        let scheduler = JobScheduler::new(config.clone(), catalog.clone(), events.clone(), audit.clone());
        let consensus = ConsensusEngine::new(config.consensus.clone(), events.clone(), audit);

        info!(
            test_cases = catalog.len(),
            testers = ?testers.roles(),
            audit = audit_enabled,
            "Orchestrator initialized"
        );

        Self {
            config,
            catalog,
            scheduler: Arc::new(Mutex::new(scheduler)),
            consensus: Arc::new(consensus),
            events,
            testers,
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &ApexConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    pub fn testers(&self) -> &TesterRegistry {
        &self.testers
    }

    pub(crate) fn scheduler(&self) -> &Arc<Mutex<JobScheduler>> {
        &self.scheduler
    }

    pub(crate) fn wake(&self) -> &Arc<Notify> {
        &self.wake
    }

    pub async fn submit(&self, request: JobRequest) -> Result<JobId, ApexError> {
        let id = self.scheduler.lock().await.submit(request)?;
        self.wake.notify_one();
        Ok(id)
    }

    pub fn plan(&self, project: &ProjectFile, request: &PlanRequest) -> Result<Plan, ApexError> {
        generate_plan(
            &project.project,
            &project.targets,
            &project.credentials,
            &self.catalog,
            request,
            &self.config.planner,
        )
    }

    /// Generate a plan and enqueue every job in it.
    pub async fn plan_and_submit(
        &self,
        project: &ProjectFile,
        request: &PlanRequest,
    ) -> Result<SubmittedPlan, ApexError> {
        let plan = self.plan(project, request)?;
        let mut job_ids = Vec::with_capacity(plan.jobs.len());
        {
            let mut scheduler = self.scheduler.lock().await;
            if let Some(limit) = project.project.settings.max_concurrency {
                scheduler.set_project_limit(&project.project.id, limit)?;
            }
            for request in plan.requests() {
                job_ids.push(scheduler.submit(request)?);
            }
        }
        self.wake.notify_one();
        info!(project_id = %plan.project_id, jobs = job_ids.len(), "Plan submitted");
        Ok(SubmittedPlan { plan, job_ids })
    }

    pub async fn cancel(&self, id: JobId) -> Result<CancelOutcome, ApexError> {
        let outcome = self.scheduler.lock().await.cancel(id)?;
        self.wake.notify_one();
        Ok(outcome)
    }

    pub async fn status(&self, id: JobId) -> Result<JobView, ApexError> {
        self.scheduler.lock().await.status(id, Instant::now())
    }

    pub async fn history(&self, id: JobId) -> Result<Vec<TransitionRecord>, ApexError> {
        self.scheduler.lock().await.history(id)
    }

    pub async fn list_jobs(&self, project_id: Option<&str>, status: Option<JobStatus>) -> Vec<JobView> {
        self.scheduler.lock().await.list(project_id, status, Instant::now())
    }

    pub async fn project_status(&self, project_id: &str) -> ProjectStatus {
        self.scheduler.lock().await.project_status(project_id)
    }

    pub async fn set_project_limit(&self, project_id: &str, max_concurrency: usize) -> Result<(), ApexError> {
        self.scheduler.lock().await.set_project_limit(project_id, max_concurrency)?;
        self.wake.notify_one();
        Ok(())
    }

    /// Hand the next admissible job of `role` to an external tester.
    ///
    /// Deadlines and due retries are settled first so pull-mode testers see
    /// the same queue the dispatcher would.
    pub async fn claim(&self, role: TesterRole) -> Option<Assignment> {
        let now = Instant::now();
        let mut scheduler = self.scheduler.lock().await;
        scheduler.expire_deadlines(now);
        scheduler.promote_due_retries(now);
        scheduler.claim(role, now)
    }

    pub async fn heartbeat(&self, id: JobId, generation: u64) -> Result<HeartbeatAck, ApexError> {
        let ack = self.scheduler.lock().await.heartbeat(id, generation, Instant::now())?;
        if !ack.proceed {
            self.wake.notify_one();
        }
        Ok(ack)
    }

    /// Deliver an attempt's result, turning any candidate findings into tentative findings.
    pub async fn report(
        &self,
        id: JobId,
        generation: u64,
        report: JobReport,
        reporter: Option<&str>,
    ) -> Result<ReportSummary, ApexError> {
        let (outcome, project_id, test_case_id) = {
            let mut scheduler = self.scheduler.lock().await;
            let outcome = scheduler.report(id, generation, report, Instant::now())?;
            let job = scheduler.job(id).ok_or_else(|| ApexError::UnknownJob(id.to_string()))?;
            (outcome, job.project_id.clone(), job.test_case_id.clone())
        };
        self.wake.notify_one();

        let (status, drafts) = match outcome {
            ReportOutcome::Stale => {
                return Ok(ReportSummary { accepted: false, status: None, findings: Vec::new() })
            }
            ReportOutcome::Applied { status, findings } => (status, findings),
        };

        let mut findings = Vec::with_capacity(drafts.len());
        for draft in drafts {
            match self.consensus.create_finding(draft, &project_id, Some(id), Some(test_case_id.clone())) {
                Ok(finding) => findings.push(finding),
                Err(e) => warn!(job_id = %id, error = %e, "Dropping malformed finding"),
            }
        }
        if self.consensus.config().review_on_create {
            for finding in &findings {
                self.request_reviews(finding.clone(), reporter);
            }
        }

        Ok(ReportSummary { accepted: true, status: Some(status), findings })
    }

    /// Ask every other registered tester to vote on a new finding.
    fn request_reviews(&self, finding: Finding, finder: Option<&str>) {
        let reviewers = self.testers.reviewers(finder);
        if reviewers.is_empty() {
            return;
        }
        debug!(finding_id = %finding.id, reviewers = reviewers.len(), "Requesting reviews");
        let finding = Arc::new(finding);
        for reviewer in reviewers {
            let consensus = self.consensus.clone();
            let finding = finding.clone();
            tokio::spawn(async move {
                review_finding(consensus, reviewer, finding).await;
            });
        }
    }

    pub async fn record_vote(
        &self,
        finding_id: FindingId,
        voter_id: &str,
        vote: VoteDraft,
    ) -> Result<VoteOutcome, ApexError> {
        self.consensus.record_vote(finding_id, voter_id, vote).await
    }

    pub async fn decide(&self, finding_id: FindingId) -> Decision {
        self.consensus.decide(finding_id).await
    }

    pub async fn finding(&self, finding_id: FindingId) -> Result<FindingDetail, ApexError> {
        self.consensus.get(finding_id).await
    }

    pub async fn findings(&self, project_id: Option<&str>, status: Option<FindingStatus>) -> Vec<Finding> {
        self.consensus.list(project_id, status).await
    }

    pub async fn set_finding_status(&self, finding_id: FindingId, status: FindingStatus) -> Result<Finding, ApexError> {
        self.consensus.set_status(finding_id, status).await
    }
}

async fn review_finding(consensus: Arc<ConsensusEngine>, reviewer: Arc<dyn Tester>, finding: Arc<Finding>) {
    match reviewer.review(&finding).await {
        Ok(Some(vote)) => {
            if let Err(e) = consensus.record_vote(finding.id, reviewer.id(), vote).await {
                warn!(finding_id = %finding.id, reviewer = reviewer.id(), error = %e, "Review vote rejected");
            }
        }
        Ok(None) => debug!(finding_id = %finding.id, reviewer = reviewer.id(), "Reviewer abstained"),
        Err(e) => warn!(finding_id = %finding.id, reviewer = reviewer.id(), error = %e, "Review failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{FindingDraft, Location, Severity, Verdict};
    use serde_json::json;

    fn project_yaml(max_concurrency: &str) -> ProjectFile {
        ProjectFile::from_yaml(&format!(
            r#"
project:
  id: acme
  settings:
    max_concurrency: {}
targets:
  - kind: url
    value: https://acme.test
    status: in_scope
"#,
            max_concurrency
        ))
        .unwrap()
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(ApexConfig::default(), Catalog::builtin(), TesterRegistry::new(), AuditTrail::disabled())
    }

    fn draft() -> FindingDraft {
        FindingDraft {
            title: "SQL injection in search".into(),
            description: "error-based".into(),
            severity: Severity::High,
            risk_score: 8.5,
            location: Location { url: Some("https://acme.test/search".into()), parameter: Some("q".into()) },
        }
    }

    #[tokio::test]
    async fn test_plan_and_submit_applies_project_limit() {
        let orch = orchestrator();
        let submitted = orch.plan_and_submit(&project_yaml("1"), &PlanRequest::default()).await.unwrap();
        assert_eq!(submitted.job_ids.len(), submitted.plan.jobs.len());
        assert!(!submitted.job_ids.is_empty());

        let first = orch.claim(submitted.plan.jobs[0].role).await;
        assert!(first.is_some());
        for role in TesterRole::ALL {
            assert!(orch.claim(role).await.is_none());
        }
        assert_eq!(orch.project_status("acme").await.status_counts["running"], 1);
    }

    #[tokio::test]
    async fn test_report_creates_findings() {
        let orch = orchestrator();
        let id = orch.submit(JobRequest::new("acme", "WSTG-INPV-05")).await.unwrap();
        let a = orch.claim(TesterRole::Fuzz).await.unwrap();
        let report = JobReport::Completed { result: json!({"payloads": 40}), findings: vec![draft()] };
        let summary = orch.report(id, a.generation, report, Some("fuzz-1")).await.unwrap();
        assert!(summary.accepted);
        assert_eq!(summary.status, Some(JobStatus::Completed));
        assert_eq!(summary.findings.len(), 1);

        let finding = &summary.findings[0];
        assert_eq!(finding.status, FindingStatus::Tentative);
        assert_eq!(finding.job_id, Some(id));
        assert_eq!(finding.test_case_id.as_deref(), Some("WSTG-INPV-05"));
        assert_eq!(orch.findings(Some("acme"), None).await.len(), 1);

        let stale = orch.report(id, a.generation, JobReport::Completed { result: json!(null), findings: vec![draft()] }, None).await.unwrap();
        assert!(!stale.accepted);
        assert_eq!(orch.findings(None, None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_votes_finalize_finding() {
        let orch = orchestrator();
        let id = orch.submit(JobRequest::new("acme", "WSTG-INPV-05")).await.unwrap();
        let a = orch.claim(TesterRole::Fuzz).await.unwrap();
        let report = JobReport::Completed { result: json!({}), findings: vec![draft()] };
        let finding_id = orch.report(id, a.generation, report, None).await.unwrap().findings[0].id;

        for (voter, confidence) in [("auth-1", 0.9), ("session-1", 0.7)] {
            orch.record_vote(finding_id, voter, VoteDraft { verdict: Verdict::Accept, confidence, rationale: None })
                .await
                .unwrap();
        }
        let decision = orch.decide(finding_id).await;
        assert_eq!(decision.status, FindingStatus::Validated);
        assert_eq!(orch.findings(None, Some(FindingStatus::Validated)).await.len(), 1);

        let fixed = orch.set_finding_status(finding_id, FindingStatus::Fixed).await.unwrap();
        assert_eq!(fixed.status, FindingStatus::Fixed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_report_times_out_without_dispatcher() {
        let orch = orchestrator();
        let id = orch.submit(JobRequest::new("acme", "WSTG-INPV-05")).await.unwrap();
        let a = orch.claim(TesterRole::Fuzz).await.unwrap();
        tokio::time::advance(a.timeout + Duration::from_secs(1)).await;

        let report = JobReport::Completed { result: json!({}), findings: vec![draft()] };
        let summary = orch.report(id, a.generation, report, Some("fuzz-1")).await.unwrap();
        assert!(!summary.accepted);
        let view = orch.status(id).await.unwrap();
        assert_eq!(view.status, JobStatus::Retrying);
        assert_eq!(view.failure_reason.as_deref(), Some("timeout"));
        assert!(orch.findings(None, None).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submit_and_cancel() {
        let orch = orchestrator();
        let mut handles = Vec::new();
        for i in 0..40 {
            let orch = orch.clone();
            handles.push(tokio::spawn(async move {
                let id = orch.submit(JobRequest::new("acme", "WSTG-INFO-01")).await.unwrap();
                if i % 2 == 0 {
                    assert_eq!(orch.cancel(id).await.unwrap(), CancelOutcome::Cancelled);
                }
                id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        let target = ids[1];
        let repeats: Vec<_> = (0..10)
            .map(|_| {
                let orch = orch.clone();
                tokio::spawn(async move { orch.cancel(target).await })
            })
            .collect();
        for repeat in repeats {
            assert_eq!(repeat.await.unwrap().unwrap(), CancelOutcome::Cancelled);
        }

        let status = orch.project_status("acme").await;
        assert_eq!(status.total_jobs, 40);
        assert_eq!(status.status_counts["cancelled"], 21);
        assert_eq!(status.status_counts["queued"], 19);
        let cancelled = orch
            .events()
            .events_since(0, None)
            .iter()
            .filter(|e| e.payload.kind() == "job_cancelled")
            .count();
        assert_eq!(cancelled, 21);
    }
}
