use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::orchestrator::Orchestrator;
use crate::agents::Assignment;
use crate::errors::ApexError;
use crate::models::JobReport;

/// Background loop that enforces deadlines, promotes due retries and
/// drives registered testers.
pub struct Dispatcher {
    orchestrator: Orchestrator,
    shutdown: CancellationToken,
    tick: Duration,
}

impl Dispatcher {
    pub fn new(orchestrator: Orchestrator, shutdown: CancellationToken) -> Self {
        let tick = Duration::from_millis(orchestrator.config().scheduler.tick_ms.max(1));
        Self { orchestrator, shutdown, tick }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let roles = self.orchestrator.testers().roles();
        info!(roles = ?roles, tick_ms = self.tick.as_millis() as u64, "Dispatcher started");
        if self.orchestrator.testers().is_empty() {
            info!("No in-process testers registered; jobs wait for pull-mode claims");
        }

        loop {
            let now = Instant::now();
            let (assignments, wakeup) = {
                let mut scheduler = self.orchestrator.scheduler().lock().await;
                let expired = scheduler.expire_deadlines(now);
                if !expired.is_empty() {
                    debug!(count = expired.len(), "Expired running jobs");
                }
                scheduler.promote_due_retries(now);
                let assignments = scheduler.dispatch_all(&roles, now);
                (assignments, scheduler.next_wakeup())
            };

            for assignment in assignments {
                self.start_attempt(assignment);
            }

            let next_tick = now + self.tick;
            let deadline = wakeup.map_or(next_tick, |w| w.min(next_tick));
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = self.orchestrator.wake().notified() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }

        info!("Dispatcher stopped");
    }

    fn start_attempt(&self, assignment: Assignment) {
        let orchestrator = self.orchestrator.clone();
        let Some(tester) = orchestrator.testers().find_for(&assignment.test_case) else {
            // Roles come from the registry, so this only happens with a custom `accepts`.
            tokio::spawn(async move {
                let err = ApexError::Rejected(format!("no tester accepts {}", assignment.test_case.id));
                let report = JobReport::from_error(&err);
                if let Err(e) = orchestrator.report(assignment.job_id, assignment.generation, report, None).await {
                    warn!(job_id = %assignment.job_id, error = %e, "Failed to report rejected job");
                }
            });
            return;
        };

        let job_id = assignment.job_id;
        let generation = assignment.generation;
        let cancel = assignment.cancel.clone();
        debug!(%job_id, generation, tester = tester.id(), "Running attempt");

        let handle = tokio::spawn(async move {
            let outcome = tokio::select! {
                result = tester.execute(assignment) => result,
                _ = cancel.cancelled() => {
                    // Cancellation checkpoint; the scheduler applies the pending cancel.
                    if let Err(e) = orchestrator.heartbeat(job_id, generation).await {
                        warn!(%job_id, error = %e, "Cancellation checkpoint failed");
                    }
                    return;
                }
            };
            let report = match outcome {
                Ok(output) => JobReport::Completed { result: output.result, findings: output.findings },
                Err(e) => {
                    warn!(%job_id, generation, tester = tester.id(), error = %e, "Tester returned an error");
                    JobReport::from_error(&e)
                }
            };
            if let Err(e) = orchestrator.report(job_id, generation, report, Some(tester.id())).await {
                warn!(%job_id, error = %e, "Failed to deliver report");
            }
        });

        tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!(%job_id, error = %e, "Tester task panicked");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::agents::{Tester, TesterOutput, TesterRegistry, TesterRole};
    use crate::audit::AuditTrail;
    use crate::catalog::Catalog;
    use crate::config::{ApexConfig, RoleConfig};
    use crate::lifecycle::JobStatus;
    use crate::models::{Finding, FindingDraft, FindingStatus, JobId, JobRequest, Location, Severity, Verdict, VoteDraft};

    enum Behaviour {
        Find,
        Hang,
        FailTransient,
    }

    struct StubTester {
        id: &'static str,
        role: TesterRole,
        behaviour: Behaviour,
        calls: AtomicU32,
        vote: Option<f64>,
    }

    impl StubTester {
        fn new(id: &'static str, role: TesterRole, behaviour: Behaviour) -> Self {
            Self { id, role, behaviour, calls: AtomicU32::new(0), vote: None }
        }

        fn voting(mut self, confidence: f64) -> Self {
            self.vote = Some(confidence);
            self
        }
    }

    #[async_trait]
    impl Tester for StubTester {
        fn id(&self) -> &str {
            self.id
        }

        fn role(&self) -> TesterRole {
            self.role
        }

        async fn execute(&self, assignment: Assignment) -> Result<TesterOutput, ApexError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Find => Ok(TesterOutput {
                    result: json!({"test_case": assignment.test_case.id}),
                    findings: vec![FindingDraft {
                        title: "Reflected XSS".into(),
                        description: String::new(),
                        severity: Severity::Medium,
                        risk_score: 6.1,
                        location: Location::default(),
                    }],
                }),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(TesterOutput::default())
                }
                Behaviour::FailTransient => Err(ApexError::Network("connection reset".into())),
            }
        }

        async fn review(&self, _finding: &Finding) -> Result<Option<VoteDraft>, ApexError> {
            Ok(self.vote.map(|confidence| VoteDraft { verdict: Verdict::Accept, confidence, rationale: None }))
        }
    }

    fn config() -> ApexConfig {
        let mut config = ApexConfig::default();
        config.retry.backoff_base_secs = 1.0;
        config.roles.insert(
            TesterRole::Fuzz,
            RoleConfig { slots: Some(1), timeout_secs: Some(5), expected_duration_secs: None },
        );
        config
    }

    fn start(testers: Vec<Arc<dyn Tester>>) -> (Orchestrator, CancellationToken, JoinHandle<()>) {
        let mut registry = TesterRegistry::new();
        for tester in testers {
            registry.register(tester);
        }
        let orchestrator = Orchestrator::new(config(), Catalog::builtin(), registry, AuditTrail::disabled());
        let shutdown = CancellationToken::new();
        let handle = Dispatcher::new(orchestrator.clone(), shutdown.clone()).spawn();
        (orchestrator, shutdown, handle)
    }

    async fn wait_for(orchestrator: &Orchestrator, id: JobId, status: JobStatus) {
        for _ in 0..2000 {
            if orchestrator.status(id).await.unwrap().status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("job {} never reached {}", id, status);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_mode_completes_and_reviews() {
        let finder = Arc::new(StubTester::new("fuzz-1", TesterRole::Fuzz, Behaviour::Find).voting(0.9));
        let reviewer_a = Arc::new(StubTester::new("auth-1", TesterRole::Auth, Behaviour::Hang).voting(0.9));
        let reviewer_b = Arc::new(StubTester::new("session-1", TesterRole::Session, Behaviour::Hang).voting(0.8));
        let (orch, shutdown, handle) = start(vec![finder.clone(), reviewer_a, reviewer_b]);

        let id = orch.submit(JobRequest::new("acme", "WSTG-INPV-01")).await.unwrap();
        wait_for(&orch, id, JobStatus::Completed).await;

        let mut validated = Vec::new();
        for _ in 0..100 {
            validated = orch.findings(Some("acme"), Some(FindingStatus::Validated)).await;
            if !validated.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(validated.len(), 1);
        let detail = orch.finding(validated[0].id).await.unwrap();
        // The finder never votes on its own finding.
        assert!(detail.votes.iter().all(|v| v.voter_id != "fuzz-1"));
        assert_eq!(finder.calls.load(Ordering::SeqCst), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_tester_times_out_until_exhausted() {
        let tester = Arc::new(StubTester::new("fuzz-1", TesterRole::Fuzz, Behaviour::Hang));
        let (orch, shutdown, handle) = start(vec![tester.clone()]);

        let id = orch.submit(JobRequest::new("acme", "WSTG-INPV-05").with_max_retries(2)).await.unwrap();
        wait_for(&orch, id, JobStatus::Failed).await;

        let view = orch.status(id).await.unwrap();
        assert_eq!(view.retries, 2);
        assert_eq!(view.failure_reason.as_deref(), Some("timeout"));
        assert_eq!(tester.calls.load(Ordering::SeqCst), 3);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_retries() {
        let tester = Arc::new(StubTester::new("fuzz-1", TesterRole::Fuzz, Behaviour::FailTransient));
        let (orch, shutdown, handle) = start(vec![tester.clone()]);

        let id = orch.submit(JobRequest::new("acme", "WSTG-INPV-05").with_max_retries(1)).await.unwrap();
        wait_for(&orch, id, JobStatus::Failed).await;

        let view = orch.status(id).await.unwrap();
        assert_eq!(view.retries, 1);
        assert_eq!(view.failure_reason.as_deref(), Some("NetworkError"));
        assert_eq!(tester.calls.load(Ordering::SeqCst), 2);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_running_push_job() {
        let tester = Arc::new(StubTester::new("fuzz-1", TesterRole::Fuzz, Behaviour::Hang));
        let (orch, shutdown, handle) = start(vec![tester]);

        let id = orch.submit(JobRequest::new("acme", "WSTG-INPV-05")).await.unwrap();
        wait_for(&orch, id, JobStatus::Running).await;
        assert_eq!(orch.cancel(id).await.unwrap(), crate::scheduler::CancelOutcome::CancellationRequested);
        wait_for(&orch, id, JobStatus::Cancelled).await;
        assert_eq!(orch.cancel(id).await.unwrap(), crate::scheduler::CancelOutcome::Cancelled);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
