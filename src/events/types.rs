use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::registry::TesterRole;
use crate::models::{FindingId, JobId, Severity, Verdict};

/// Observable lifecycle, finding and vote notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    JobQueued {
        job_id: JobId,
        project_id: String,
        test_case_id: String,
        role: TesterRole,
        priority: u8,
    },
    JobStarted {
        job_id: JobId,
        project_id: String,
        role: TesterRole,
        generation: u64,
    },
    JobCompleted {
        job_id: JobId,
        project_id: String,
        generation: u64,
        duration_ms: u64,
        findings: usize,
    },
    JobFailed {
        job_id: JobId,
        project_id: String,
        generation: u64,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// No further attempts will be made.
        terminal: bool,
    },
    JobRetrying {
        job_id: JobId,
        project_id: String,
        retries: u32,
        max_retries: u32,
        delay_ms: u64,
    },
    JobCancelled {
        job_id: JobId,
        project_id: String,
    },
    FindingCreated {
        finding_id: FindingId,
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
        project_id: String,
        title: String,
        severity: Severity,
    },
    VoteRecorded {
        finding_id: FindingId,
        voter_id: String,
        verdict: Verdict,
        confidence: f64,
    },
    FindingValidated {
        finding_id: FindingId,
        project_id: String,
        score: f64,
        confidence: f64,
    },
    FindingFalsePositive {
        finding_id: FindingId,
        project_id: String,
        score: f64,
        confidence: f64,
    },
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JobQueued { .. } => "job_queued",
            Self::JobStarted { .. } => "job_started",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobFailed { .. } => "job_failed",
            Self::JobRetrying { .. } => "job_retrying",
            Self::JobCancelled { .. } => "job_cancelled",
            Self::FindingCreated { .. } => "finding_created",
            Self::VoteRecorded { .. } => "vote_recorded",
            Self::FindingValidated { .. } => "finding_validated",
            Self::FindingFalsePositive { .. } => "finding_false_positive",
        }
    }
}

/// Wire envelope: `{type, data, timestamp, seq}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub payload: EventPayload,
    pub timestamp: DateTime<Utc>,
    /// Strictly increasing per publisher; consumers resume with `since`.
    pub seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let event = Event {
            payload: EventPayload::JobCancelled { job_id: JobId::new(), project_id: "p".into() },
            timestamp: Utc::now(),
            seq: 7,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "job_cancelled");
        assert_eq!(value["data"]["project_id"], "p");
        assert_eq!(value["seq"], 7);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let payload = EventPayload::FindingFalsePositive {
            finding_id: FindingId::new(),
            project_id: "p".into(),
            score: -1.6,
            confidence: 0.8,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], payload.kind());
    }
}
