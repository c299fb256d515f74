use serde_json::{json, Value};

use apex::agents::{TesterRegistry, TesterRole};
use apex::audit::{AuditTrail, AuditWriter};
use apex::catalog::Catalog;
use apex::config::{parse_config_str, ApexConfig};
use apex::lifecycle::JobStatus;
use apex::models::{FindingDraft, FindingStatus, JobReport, ProjectFile, Severity, Verdict, VoteDraft};
use apex::pipeline::Orchestrator;
use apex::planner::PlanRequest;

const PROJECT: &str = r#"
project:
  id: shop
  settings:
    test_case_priorities:
      WSTG-INPV-05: 5
targets:
  - kind: url
    value: https://shop.test
    status: in_scope
credentials:
  - kind: form
"#;

fn draft(title: &str) -> FindingDraft {
    FindingDraft {
        title: title.into(),
        description: String::new(),
        severity: Severity::High,
        risk_score: 7.0,
        location: Default::default(),
    }
}

fn vote(verdict: Verdict, confidence: f64) -> VoteDraft {
    VoteDraft { verdict, confidence, rationale: Some("reproduced".into()) }
}

#[tokio::test]
async fn test_plan_execute_validate_with_audit_log() {
    let dir = tempfile::tempdir().unwrap();
    let writer = AuditWriter::open(dir.path()).await.unwrap();
    let audit_path = writer.path().to_path_buf();
    let (trail, rx) = AuditTrail::channel();
    let writer_task = writer.spawn(rx);

    let orch = Orchestrator::new(ApexConfig::default(), Catalog::builtin(), TesterRegistry::new(), trail);
    let project = ProjectFile::from_yaml(PROJECT).unwrap();
    let submitted = orch.plan_and_submit(&project, &PlanRequest::default()).await.unwrap();
    assert!(submitted.plan.jobs.iter().any(|j| j.request.test_case_id.starts_with("WSTG-SESS")));

    let sqli = orch.claim(TesterRole::Fuzz).await.unwrap();
    assert_eq!(sqli.test_case.role, TesterRole::Fuzz);

    let report = JobReport::Completed { result: json!({}), findings: vec![draft("Blind SQL injection")] };
    let summary = orch.report(sqli.job_id, sqli.generation, report, Some("fuzz-1")).await.unwrap();
    let finding_id = summary.findings[0].id;

    orch.record_vote(finding_id, "recon-1", vote(Verdict::Reject, 0.9)).await.unwrap();
    let outcome = orch.record_vote(finding_id, "auth-1", vote(Verdict::Reject, 0.7)).await.unwrap();
    assert_eq!(outcome.decision.status, FindingStatus::FalsePositive);

    // Later votes are recorded but the decision sticks.
    let outcome = orch.record_vote(finding_id, "session-1", vote(Verdict::Accept, 1.0)).await.unwrap();
    assert!(outcome.recorded);
    assert_eq!(outcome.decision.status, FindingStatus::FalsePositive);

    let status = orch.project_status("shop").await;
    assert_eq!(status.status_counts["completed"], 1);
    assert_eq!(status.total_jobs, submitted.job_ids.len());

    drop(orch);
    writer_task.await.unwrap();

    let content = tokio::fs::read_to_string(&audit_path).await.unwrap();
    let lines: Vec<Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    let kinds: Vec<&str> = lines.iter().map(|l| l["event"].as_str().unwrap()).collect();
    assert_eq!(kinds.iter().filter(|k| **k == "job_transition").count(), 2);
    assert_eq!(kinds.iter().filter(|k| **k == "vote").count(), 3);
    assert_eq!(kinds.iter().filter(|k| **k == "consensus_decision").count(), 1);
    let decision = lines.iter().find(|l| l["event"] == "consensus_decision").unwrap();
    assert_eq!(decision["data"]["disposition"], "false_positive");
    assert!((decision["data"]["confidence"].as_f64().unwrap() - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn test_configured_consensus_threshold() {
    let config = parse_config_str(
        r#"
consensus:
  accept_threshold: 0.5
  quorum: 1
"#,
    )
    .unwrap();
    let orch = Orchestrator::new(config, Catalog::builtin(), TesterRegistry::new(), AuditTrail::disabled());

    let job = orch.submit(apex::models::JobRequest::new("shop", "WSTG-CONF-03")).await.unwrap();
    let role = orch.status(job).await.unwrap().role;
    let a = orch.claim(role).await.unwrap();
    let report = JobReport::Completed { result: Value::Null, findings: vec![draft("TRACE enabled")] };
    let finding_id = orch.report(job, a.generation, report, None).await.unwrap().findings[0].id;

    let outcome = orch.record_vote(finding_id, "exploit-1", vote(Verdict::Accept, 0.6)).await.unwrap();
    assert_eq!(outcome.decision.status, FindingStatus::Validated);
    assert_eq!(orch.status(job).await.unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn test_retry_then_success_over_pull_protocol() {
    let config = parse_config_str(
        r#"
retry:
  max_retries: 1
  backoff_base_secs: 0.0
"#,
    )
    .unwrap();
    let orch = Orchestrator::new(config, Catalog::builtin(), TesterRegistry::new(), AuditTrail::disabled());
    let job = orch.submit(apex::models::JobRequest::new("shop", "WSTG-INPV-05")).await.unwrap();

    let first = orch.claim(TesterRole::Fuzz).await.unwrap();
    let failure = JobReport::Failed { error: "proxy reset".into(), retryable: true, error_type: None };
    let summary = orch.report(job, first.generation, failure, None).await.unwrap();
    assert_eq!(summary.status, Some(JobStatus::Retrying));

    // Zero backoff: the retry is due at the next claim.
    let second = orch.claim(TesterRole::Fuzz).await.unwrap();
    assert_eq!(second.job_id, job);
    assert_eq!(second.generation, first.generation + 1);

    let late = orch.report(job, first.generation, JobReport::Completed { result: Value::Null, findings: vec![] }, None);
    assert!(!late.await.unwrap().accepted);

    let done = JobReport::Completed { result: json!({"rows": 3}), findings: vec![] };
    orch.report(job, second.generation, done, None).await.unwrap();
    let view = orch.status(job).await.unwrap();
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.retries, 1);
    assert_eq!(view.result, Some(json!({"rows": 3})));

    let path: Vec<JobStatus> = orch.history(job).await.unwrap().iter().map(|t| t.to).collect();
    assert_eq!(
        path,
        vec![
            JobStatus::Running,
            JobStatus::Failed,
            JobStatus::Retrying,
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Completed,
        ]
    );
}
