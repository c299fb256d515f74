use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::eta::{queued_wait, DurationStats};
use super::queue::ReadyQueue;
use crate::agents::{Assignment, TesterRole};
use crate::audit::{AuditRecord, AuditTrail, JobTransition};
use crate::catalog::Catalog;
use crate::config::ApexConfig;
use crate::errors::ApexError;
use crate::events::{EventPayload, EventPublisher};
use crate::lifecycle::{JobLifecycle, JobStatus, LifecycleEvent, TransitionRecord};
use crate::models::{FindingDraft, Job, JobId, JobReport, JobRequest, Priority};

/// Upper bound on a scheduled retry when the configured backoff overflows.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30 * 24 * 3600);

/// Result of delivering a tester report.
#[derive(Debug, Clone)]
pub enum ReportOutcome {
    Applied {
        status: JobStatus,
        /// Candidate findings carried by a completed result.
        findings: Vec<FindingDraft>,
    },
    /// The report belonged to a superseded attempt and was discarded.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled,
    /// The job is running; cancellation applies at its next checkpoint.
    CancellationRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeartbeatAck {
    /// False tells the tester to stop working on this attempt.
    #[serde(rename = "continue")]
    pub proceed: bool,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub project_id: String,
    pub test_case_id: String,
    pub role: TesterRole,
    pub status: JobStatus,
    pub priority: u8,
    pub retries: u32,
    pub max_retries: u32,
    pub generation: u64,
    pub eta: Option<DateTime<Utc>>,
    pub eta_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub cancel_requested: bool,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatus {
    pub project_id: String,
    pub total_jobs: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub progress_percent: f64,
    pub is_complete: bool,
}

/// Owns every job record, the ready queue and the slot counters.
///
/// All methods are synchronous and take the current monotonic instant so
/// callers can run them inside one short critical section.
pub struct JobScheduler {
    config: Arc<ApexConfig>,
    catalog: Arc<Catalog>,
    jobs: HashMap<JobId, Job>,
    submitted: Vec<JobId>,
    queue: ReadyQueue,
    running: HashSet<JobId>,
    retrying: HashSet<JobId>,
    running_by_role: HashMap<TesterRole, usize>,
    running_by_project: HashMap<String, usize>,
    project_limits: HashMap<String, usize>,
    tokens: HashMap<JobId, CancellationToken>,
    stats: DurationStats,
    events: EventPublisher,
    audit: AuditTrail,
}

impl JobScheduler {
    pub fn new(
        config: Arc<ApexConfig>,
        catalog: Arc<Catalog>,
        events: EventPublisher,
        audit: AuditTrail,
    ) -> Self {
        let stats = DurationStats::new(config.scheduler.eta_window);
        Self {
            config,
            catalog,
            jobs: HashMap::new(),
            submitted: Vec::new(),
            queue: ReadyQueue::new(),
            running: HashSet::new(),
            retrying: HashSet::new(),
            running_by_role: HashMap::new(),
            running_by_project: HashMap::new(),
            project_limits: HashMap::new(),
            tokens: HashMap::new(),
            stats,
            events,
            audit,
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Validate and enqueue a job request.
    pub fn submit(&mut self, request: JobRequest) -> Result<JobId, ApexError> {
        if request.project_id.trim().is_empty() {
            return Err(ApexError::Validation("project_id must not be empty".into()));
        }
        let case = self
            .catalog
            .get(&request.test_case_id)
            .ok_or_else(|| ApexError::UnknownTestCase(request.test_case_id.clone()))?;

        let options = request.options;
        let priority = match options.priority {
            Some(p) => Priority::new(p).ok_or_else(|| {
                ApexError::Validation(format!("priority {} outside 1..=5", p))
            })?,
            None => case.base_priority,
        };
        let ceiling = self.config.retry.max_retries_ceiling;
        let max_retries = options.max_retries.unwrap_or(self.config.retry.max_retries);
        if max_retries > ceiling {
            return Err(ApexError::Validation(format!(
                "max_retries {} exceeds ceiling {}",
                max_retries, ceiling
            )));
        }
        let timeout = match options.timeout_secs {
            Some(0) => return Err(ApexError::Validation("timeout_secs must be positive".into())),
            Some(secs) => Duration::from_secs(secs),
            None => self.config.role_timeout(case.role),
        };

        let job = Job {
            id: JobId::new(),
            project_id: request.project_id,
            test_case_id: request.test_case_id,
            role: case.role,
            priority,
            timeout,
            metadata: options.metadata,
            lifecycle: JobLifecycle::new(max_retries),
            scheduled_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
            failure_reason: None,
            cancel_requested: false,
            started_instant: None,
            deadline: None,
            retry_at: None,
        };
        let id = job.id;

        info!(
            job_id = %id,
            project_id = %job.project_id,
            test_case = %job.test_case_id,
            role = %job.role,
            priority = priority.get(),
            "Job queued"
        );
        self.events.publish(EventPayload::JobQueued {
            job_id: id,
            project_id: job.project_id.clone(),
            test_case_id: job.test_case_id.clone(),
            role: job.role,
            priority: priority.get(),
        });

        self.queue.push(id, priority);
        self.submitted.push(id);
        self.jobs.insert(id, job);
        Ok(id)
    }

    pub fn set_project_limit(&mut self, project_id: &str, max_concurrency: usize) -> Result<(), ApexError> {
        if max_concurrency == 0 {
            return Err(ApexError::Validation("max_concurrency must be positive".into()));
        }
        self.project_limits.insert(project_id.to_string(), max_concurrency);
        Ok(())
    }

    fn project_limit(&self, project_id: &str) -> usize {
        self.project_limits
            .get(project_id)
            .copied()
            .unwrap_or(self.config.scheduler.default_max_concurrency)
    }

    fn has_slot(&self, job: &Job) -> bool {
        let role_used = self.running_by_role.get(&job.role).copied().unwrap_or(0);
        let project_used = self.running_by_project.get(&job.project_id).copied().unwrap_or(0);
        role_used < self.config.role_slots(job.role) && project_used < self.project_limit(&job.project_id)
    }

    /// Start the earliest queued job accepted by `wants` that has a free slot.
    pub fn dispatch_next<F>(&mut self, wants: F, now: Instant) -> Option<Assignment>
    where
        F: Fn(TesterRole) -> bool,
    {
        if self.queue.is_empty() {
            return None;
        }
        let id = self.queue.iter().find(|id| {
            self.jobs
                .get(id)
                .map(|job| wants(job.role) && self.has_slot(job))
                .unwrap_or(false)
        })?;
        self.queue.remove(id);

        let job = self.jobs.get_mut(&id)?;
        if let Err(e) = job.lifecycle.transition(LifecycleEvent::Dispatch) {
            warn!(job_id = %id, error = %e, "Queued job could not be dispatched");
            return None;
        }
        job.started_at = Some(Utc::now());
        job.started_instant = Some(now);
        job.deadline = now.checked_add(job.timeout);
        record_transition(&self.audit, job);

        *self.running_by_role.entry(job.role).or_default() += 1;
        *self.running_by_project.entry(job.project_id.clone()).or_default() += 1;
        self.running.insert(id);
        let token = CancellationToken::new();
        self.tokens.insert(id, token.clone());

        info!(
            job_id = %id,
            role = %job.role,
            generation = job.generation(),
            timeout_secs = job.timeout.as_secs(),
            "Job started"
        );
        self.events.publish(EventPayload::JobStarted {
            job_id: id,
            project_id: job.project_id.clone(),
            role: job.role,
            generation: job.generation(),
        });

        let test_case = self.catalog.get(&job.test_case_id)?.clone();
        Some(Assignment {
            job_id: id,
            generation: job.generation(),
            project_id: job.project_id.clone(),
            test_case,
            metadata: job.metadata.clone(),
            timeout: job.timeout,
            cancel: token,
        })
    }

    /// Pull-mode claim: next admissible job for one role.
    pub fn claim(&mut self, role: TesterRole, now: Instant) -> Option<Assignment> {
        self.dispatch_next(|r| r == role, now)
    }

    /// Dispatch as many jobs as slots allow for the given roles.
    pub fn dispatch_all(&mut self, roles: &[TesterRole], now: Instant) -> Vec<Assignment> {
        let mut started = Vec::new();
        while let Some(assignment) = self.dispatch_next(|r| roles.contains(&r), now) {
            started.push(assignment);
        }
        started
    }

    fn release_slot(&mut self, id: JobId) {
        let Some(job) = self.jobs.get(&id) else { return };
        if !self.running.remove(&id) {
            return;
        }
        if let Some(n) = self.running_by_role.get_mut(&job.role) {
            *n = n.saturating_sub(1);
        }
        if let Some(n) = self.running_by_project.get_mut(&job.project_id) {
            *n = n.saturating_sub(1);
        }
        self.tokens.remove(&id);
    }

    fn is_current_attempt(&self, id: JobId, generation: u64) -> Result<bool, ApexError> {
        let job = self.jobs.get(&id).ok_or_else(|| ApexError::UnknownJob(id.to_string()))?;
        Ok(job.status() == JobStatus::Running && job.generation() == generation)
    }

    /// Deliver the result of an attempt.
    pub fn report(
        &mut self,
        id: JobId,
        generation: u64,
        report: JobReport,
        now: Instant,
    ) -> Result<ReportOutcome, ApexError> {
        self.settle_deadline(id, now)?;
        if !self.is_current_attempt(id, generation)? {
            warn!(job_id = %id, generation, "Discarding stale report");
            return Ok(ReportOutcome::Stale);
        }
        if self.jobs.get(&id).map(|j| j.cancel_requested).unwrap_or(false) {
            debug!(job_id = %id, "Report arrived after cancellation request");
            self.apply_cancel(id)?;
            return Ok(ReportOutcome::Applied { status: JobStatus::Cancelled, findings: Vec::new() });
        }

        match report {
            JobReport::Completed { result, findings } => {
                self.release_slot(id);
                let job = self.jobs.get_mut(&id).ok_or_else(|| ApexError::UnknownJob(id.to_string()))?;
                job.lifecycle.transition(LifecycleEvent::Complete)?;
                job.result = Some(result);
                job.completed_at = Some(Utc::now());
                job.deadline = None;
                let elapsed = job.started_instant.map(|s| now.saturating_duration_since(s)).unwrap_or_default();
                record_transition(&self.audit, job);

                info!(
                    job_id = %id,
                    duration_ms = elapsed.as_millis() as u64,
                    findings = findings.len(),
                    "Job completed"
                );
                self.events.publish(EventPayload::JobCompleted {
                    job_id: id,
                    project_id: job.project_id.clone(),
                    generation,
                    duration_ms: elapsed.as_millis() as u64,
                    findings: findings.len(),
                });
                let role = job.role;
                self.stats.record(role, elapsed);
                Ok(ReportOutcome::Applied { status: JobStatus::Completed, findings })
            }
            JobReport::Failed { error, retryable, error_type } => {
                let reason = error_type.unwrap_or_else(|| "error".to_string());
                let status = self.fail_attempt(id, &reason, Some(error), retryable, now)?;
                Ok(ReportOutcome::Applied { status, findings: Vec::new() })
            }
        }
    }

    /// Mark a running attempt failed and run the retry policy.
    fn fail_attempt(
        &mut self,
        id: JobId,
        reason: &str,
        error: Option<String>,
        retryable: bool,
        now: Instant,
    ) -> Result<JobStatus, ApexError> {
        self.release_slot(id);
        let job = self.jobs.get_mut(&id).ok_or_else(|| ApexError::UnknownJob(id.to_string()))?;
        job.lifecycle.transition(LifecycleEvent::Fail { reason: reason.to_string(), retryable })?;
        job.deadline = None;
        job.failure_reason = Some(reason.to_string());
        job.error_message = error.clone();
        record_transition(&self.audit, job);

        let terminal = !job.lifecycle.can_retry();
        warn!(
            job_id = %id,
            reason,
            error = error.as_deref().unwrap_or(""),
            retries = job.lifecycle.retries(),
            terminal,
            "Job attempt failed"
        );
        self.events.publish(EventPayload::JobFailed {
            job_id: id,
            project_id: job.project_id.clone(),
            generation: job.generation(),
            reason: reason.to_string(),
            error,
            terminal,
        });

        if terminal {
            job.completed_at = Some(Utc::now());
            return Ok(JobStatus::Failed);
        }

        job.lifecycle.transition(LifecycleEvent::Retry)?;
        let delay = self.config.retry.delay(job.lifecycle.retries());
        job.retry_at = Some(now.checked_add(delay).unwrap_or(now + MAX_RETRY_DELAY));
        record_transition(&self.audit, job);

        info!(
            job_id = %id,
            retries = job.lifecycle.retries(),
            max_retries = job.lifecycle.max_retries(),
            delay_ms = delay.as_millis() as u64,
            "Job scheduled for retry"
        );
        self.events.publish(EventPayload::JobRetrying {
            job_id: id,
            project_id: job.project_id.clone(),
            retries: job.lifecycle.retries(),
            max_retries: job.lifecycle.max_retries(),
            delay_ms: delay.as_millis() as u64,
        });
        self.retrying.insert(id);
        Ok(JobStatus::Retrying)
    }

    /// Cooperative checkpoint for a running attempt.
    pub fn heartbeat(&mut self, id: JobId, generation: u64, now: Instant) -> Result<HeartbeatAck, ApexError> {
        self.settle_deadline(id, now)?;
        if !self.is_current_attempt(id, generation)? {
            let status = self.jobs.get(&id).map(|j| j.status()).unwrap_or(JobStatus::Cancelled);
            return Ok(HeartbeatAck { proceed: false, status });
        }
        if self.jobs.get(&id).map(|j| j.cancel_requested).unwrap_or(false) {
            self.apply_cancel(id)?;
            return Ok(HeartbeatAck { proceed: false, status: JobStatus::Cancelled });
        }
        Ok(HeartbeatAck { proceed: true, status: JobStatus::Running })
    }

    fn apply_cancel(&mut self, id: JobId) -> Result<(), ApexError> {
        if let Some(token) = self.tokens.get(&id) {
            token.cancel();
        }
        self.release_slot(id);
        self.queue.remove(id);
        self.retrying.remove(&id);

        let job = self.jobs.get_mut(&id).ok_or_else(|| ApexError::UnknownJob(id.to_string()))?;
        job.lifecycle.transition(LifecycleEvent::Cancel)?;
        job.deadline = None;
        job.retry_at = None;
        job.completed_at = Some(Utc::now());
        record_transition(&self.audit, job);

        info!(job_id = %id, "Job cancelled");
        self.events.publish(EventPayload::JobCancelled {
            job_id: id,
            project_id: job.project_id.clone(),
        });
        Ok(())
    }

    pub fn cancel(&mut self, id: JobId) -> Result<CancelOutcome, ApexError> {
        let job = self.jobs.get_mut(&id).ok_or_else(|| ApexError::UnknownJob(id.to_string()))?;
        match job.status() {
            JobStatus::Cancelled => Ok(CancelOutcome::Cancelled),
            JobStatus::Completed | JobStatus::Failed => Err(ApexError::AlreadyTerminal(id.to_string())),
            JobStatus::Running => {
                if !job.cancel_requested {
                    job.cancel_requested = true;
                    info!(job_id = %id, "Cancellation requested for running job");
                    if let Some(token) = self.tokens.get(&id) {
                        token.cancel();
                    }
                }
                Ok(CancelOutcome::CancellationRequested)
            }
            JobStatus::Queued | JobStatus::Retrying => {
                self.apply_cancel(id)?;
                Ok(CancelOutcome::Cancelled)
            }
        }
    }

    /// Fail running attempts whose deadline has passed. Returns the affected jobs.
    pub fn expire_deadlines(&mut self, now: Instant) -> Vec<JobId> {
        let mut expired: Vec<JobId> = self
            .running
            .iter()
            .filter(|id| {
                self.jobs
                    .get(*id)
                    .and_then(|j| j.deadline)
                    .map(|d| d <= now)
                    .unwrap_or(false)
            })
            .copied()
            .collect();
        expired.sort_by_key(|id| self.jobs.get(id).and_then(|j| j.deadline));

        for id in &expired {
            if let Err(e) = self.expire_attempt(*id, now) {
                warn!(job_id = %id, error = %e, "Failed to expire job");
            }
        }
        expired
    }

    fn expire_attempt(&mut self, id: JobId, now: Instant) -> Result<(), ApexError> {
        let cancel_requested = self.jobs.get(&id).map(|j| j.cancel_requested).unwrap_or(false);
        if cancel_requested {
            self.apply_cancel(id)
        } else {
            self.fail_attempt(id, "timeout", Some("deadline exceeded".into()), true, now)
                .map(|_| ())
        }
    }

    /// Expire this job's attempt if its deadline passed before housekeeping ran.
    fn settle_deadline(&mut self, id: JobId, now: Instant) -> Result<(), ApexError> {
        let overdue = self
            .jobs
            .get(&id)
            .filter(|j| j.status() == JobStatus::Running)
            .and_then(|j| j.deadline)
            .map(|d| d <= now)
            .unwrap_or(false);
        if overdue {
            debug!(job_id = %id, "Deadline passed before checkpoint");
            self.expire_attempt(id, now)?;
        }
        Ok(())
    }

    /// Move retrying jobs whose backoff has elapsed back to the ready queue.
    pub fn promote_due_retries(&mut self, now: Instant) -> usize {
        let mut due: Vec<JobId> = self
            .retrying
            .iter()
            .filter(|id| {
                self.jobs
                    .get(*id)
                    .and_then(|j| j.retry_at)
                    .map(|t| t <= now)
                    .unwrap_or(false)
            })
            .copied()
            .collect();
        due.sort_by_key(|id| self.jobs.get(id).and_then(|j| j.retry_at));

        let mut promoted = 0;
        for id in due {
            self.retrying.remove(&id);
            let Some(job) = self.jobs.get_mut(&id) else { continue };
            if let Err(e) = job.lifecycle.transition(LifecycleEvent::Requeue) {
                warn!(job_id = %id, error = %e, "Retry promotion rejected");
                continue;
            }
            job.retry_at = None;
            record_transition(&self.audit, job);
            debug!(job_id = %id, "Retry backoff elapsed, requeued");
            self.events.publish(EventPayload::JobQueued {
                job_id: id,
                project_id: job.project_id.clone(),
                test_case_id: job.test_case_id.clone(),
                role: job.role,
                priority: job.priority.get(),
            });
            self.queue.push(id, job.priority);
            promoted += 1;
        }
        promoted
    }

    /// Earliest deadline or retry instant still pending.
    pub fn next_wakeup(&self) -> Option<Instant> {
        let deadlines = self.running.iter().filter_map(|id| self.jobs.get(id)?.deadline);
        let retries = self.retrying.iter().filter_map(|id| self.jobs.get(id)?.retry_at);
        deadlines.chain(retries).min()
    }

    fn average_duration(&self, role: TesterRole) -> Duration {
        self.stats
            .average(role)
            .unwrap_or_else(|| self.config.role_expected_duration(role))
    }

    /// Remaining time until the job is expected to complete.
    pub fn eta(&self, id: JobId, now: Instant) -> Option<Duration> {
        let job = self.jobs.get(&id)?;
        let average = self.average_duration(job.role);
        let slots = self.config.role_slots(job.role);
        match job.status() {
            JobStatus::Queued => {
                let mut position = 0;
                for queued in self.queue.iter() {
                    if self.jobs.get(&queued).map(|j| j.role) == Some(job.role) {
                        position += 1;
                    }
                    if queued == id {
                        break;
                    }
                }
                Some(queued_wait(position, average, slots))
            }
            JobStatus::Retrying => {
                let ahead = self
                    .queue
                    .iter()
                    .filter_map(|q| self.jobs.get(&q))
                    .filter(|j| j.role == job.role && j.priority >= job.priority)
                    .count();
                let backoff = job
                    .retry_at
                    .map(|t| t.saturating_duration_since(now))
                    .unwrap_or_default();
                Some(backoff + queued_wait(ahead + 1, average, slots))
            }
            JobStatus::Running => {
                let started = job.started_instant.unwrap_or(now);
                Some((started + average).saturating_duration_since(now))
            }
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => None,
        }
    }

    fn view(&self, job: &Job, now: Instant) -> JobView {
        let eta = self.eta(job.id, now);
        JobView {
            id: job.id,
            project_id: job.project_id.clone(),
            test_case_id: job.test_case_id.clone(),
            role: job.role,
            status: job.status(),
            priority: job.priority.get(),
            retries: job.lifecycle.retries(),
            max_retries: job.lifecycle.max_retries(),
            generation: job.generation(),
            eta: eta.and_then(|d| chrono::Duration::from_std(d).ok()).map(|d| Utc::now() + d),
            eta_secs: eta.map(|d| d.as_secs_f64()),
            result: job.result.clone(),
            error_message: job.error_message.clone(),
            failure_reason: job.failure_reason.clone(),
            cancel_requested: job.cancel_requested,
            scheduled_at: job.scheduled_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            metadata: job.metadata.clone(),
        }
    }

    pub fn status(&self, id: JobId, now: Instant) -> Result<JobView, ApexError> {
        let job = self.jobs.get(&id).ok_or_else(|| ApexError::UnknownJob(id.to_string()))?;
        Ok(self.view(job, now))
    }

    pub fn history(&self, id: JobId) -> Result<Vec<TransitionRecord>, ApexError> {
        let job = self.jobs.get(&id).ok_or_else(|| ApexError::UnknownJob(id.to_string()))?;
        Ok(job.lifecycle.history().to_vec())
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Jobs in submission order, optionally filtered.
    pub fn list(&self, project_id: Option<&str>, status: Option<JobStatus>, now: Instant) -> Vec<JobView> {
        self.submitted
            .iter()
            .filter_map(|id| self.jobs.get(id))
            .filter(|j| project_id.map_or(true, |p| j.project_id == p))
            .filter(|j| status.map_or(true, |s| j.status() == s))
            .map(|j| self.view(j, now))
            .collect()
    }

    pub fn project_status(&self, project_id: &str) -> ProjectStatus {
        let mut status_counts: BTreeMap<String, usize> =
            JobStatus::ALL.iter().map(|s| (s.to_string(), 0)).collect();
        let mut total = 0;
        let mut finished = 0;
        for job in self.jobs.values().filter(|j| j.project_id == project_id) {
            total += 1;
            *status_counts.entry(job.status().to_string()).or_default() += 1;
            if job.lifecycle.is_terminal() {
                finished += 1;
            }
        }
        let progress_percent = if total == 0 {
            0.0
        } else {
            (finished as f64 / total as f64 * 1000.0).round() / 10.0
        };
        ProjectStatus {
            project_id: project_id.to_string(),
            total_jobs: total,
            status_counts,
            progress_percent,
            is_complete: total > 0 && finished == total,
        }
    }
}

fn record_transition(audit: &AuditTrail, job: &Job) {
    if let Some(last) = job.lifecycle.history().last() {
        debug!(
            job_id = %job.id,
            from = %last.from,
            to = %last.to,
            event = %last.event,
            generation = last.generation,
            "Job transition"
        );
        audit.record(AuditRecord::Transition(JobTransition {
            job_id: job.id,
            project_id: job.project_id.clone(),
            transition: last.clone(),
        }));
    }
}
