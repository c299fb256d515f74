use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ApexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Retrying,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Retrying,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs that drive a job through its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Dispatch,
    Complete,
    Fail { reason: String, retryable: bool },
    /// Failed attempt enters backoff.
    Retry,
    /// Backoff elapsed; job goes back to the ready queue.
    Requeue,
    Cancel,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::Complete => "complete",
            Self::Fail { .. } => "fail",
            Self::Retry => "retry",
            Self::Requeue => "requeue",
            Self::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: JobStatus,
    pub to: JobStatus,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub generation: u64,
    pub at: DateTime<Utc>,
}

/// Authoritative status of one job plus its retry bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct JobLifecycle {
    status: JobStatus,
    retries: u32,
    max_retries: u32,
    generation: u64,
    /// Set once a failure will not be retried.
    exhausted: bool,
    history: Vec<TransitionRecord>,
}

impl JobLifecycle {
    pub fn new(max_retries: u32) -> Self {
        Self {
            status: JobStatus::Queued,
            retries: 0,
            max_retries,
            generation: 0,
            exhausted: false,
            history: Vec::new(),
        }
    }

    pub fn current_status(&self) -> JobStatus {
        self.status
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Incremented on every dispatch so stale attempts can be told apart.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        match self.status {
            JobStatus::Completed | JobStatus::Cancelled => true,
            JobStatus::Failed => self.exhausted,
            _ => false,
        }
    }

    /// Whether a failed job may still move to `retrying`.
    pub fn can_retry(&self) -> bool {
        self.status == JobStatus::Failed && !self.exhausted
    }

    /// Apply an event. Illegal transitions leave the lifecycle untouched.
    pub fn transition(&mut self, event: LifecycleEvent) -> Result<JobStatus, ApexError> {
        let from = self.status;
        let to = match (&event, from) {
            (LifecycleEvent::Dispatch, JobStatus::Queued) => JobStatus::Running,
            (LifecycleEvent::Complete, JobStatus::Running) => JobStatus::Completed,
            (LifecycleEvent::Fail { .. }, JobStatus::Running) => JobStatus::Failed,
            (LifecycleEvent::Retry, JobStatus::Failed) if !self.exhausted => JobStatus::Retrying,
            (LifecycleEvent::Requeue, JobStatus::Retrying) => JobStatus::Queued,
            (
                LifecycleEvent::Cancel,
                JobStatus::Queued | JobStatus::Running | JobStatus::Retrying,
            ) => JobStatus::Cancelled,
            _ => {
                return Err(ApexError::InvalidTransition {
                    from: from.to_string(),
                    event: event.name().to_string(),
                })
            }
        };

        let mut reason = None;
        match &event {
            LifecycleEvent::Dispatch => self.generation += 1,
            LifecycleEvent::Fail { reason: r, retryable } => {
                self.exhausted = !*retryable || self.retries >= self.max_retries;
                reason = Some(r.clone());
            }
            LifecycleEvent::Retry => self.retries += 1,
            _ => {}
        }

        self.status = to;
        self.history.push(TransitionRecord {
            from,
            to,
            event: event.name().to_string(),
            reason,
            generation: self.generation,
            at: Utc::now(),
        });
        Ok(to)
    }
}
