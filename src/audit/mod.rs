pub mod writer;

pub use writer::AuditWriter;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::lifecycle::TransitionRecord;
use crate::models::{Disposition, FindingId, JobId, Vote};

#[derive(Debug, Clone, Serialize)]
pub struct JobTransition {
    pub job_id: JobId,
    pub project_id: String,
    #[serde(flatten)]
    pub transition: TransitionRecord,
}

/// Durable record of a state change.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AuditRecord {
    Transition(JobTransition),
    Vote(Vote),
    Decision {
        finding_id: FindingId,
        disposition: Disposition,
        score: f64,
        confidence: f64,
        votes: usize,
    },
}

impl AuditRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transition(_) => "job_transition",
            Self::Vote(_) => "vote",
            Self::Decision { .. } => "consensus_decision",
        }
    }
}

/// Cheap handle for emitting audit records; a no-op when auditing is off.
#[derive(Clone, Default)]
pub struct AuditTrail {
    tx: Option<mpsc::UnboundedSender<AuditRecord>>,
}

impl AuditTrail {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AuditRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn record(&self, record: AuditRecord) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(record);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{JobLifecycle, LifecycleEvent};

    #[test]
    fn test_disabled_trail_is_noop() {
        let trail = AuditTrail::disabled();
        assert!(!trail.is_enabled());
        trail.record(AuditRecord::Decision {
            finding_id: FindingId::new(),
            disposition: Disposition::Pending,
            score: 0.0,
            confidence: 0.0,
            votes: 0,
        });
    }

    #[tokio::test]
    async fn test_writer_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AuditWriter::open(dir.path()).await.unwrap();
        let path = writer.path().to_path_buf();
        let (trail, rx) = AuditTrail::channel();
        let handle = writer.spawn(rx);

        let mut lc = JobLifecycle::new(1);
        lc.transition(LifecycleEvent::Dispatch).unwrap();
        trail.record(AuditRecord::Transition(JobTransition {
            job_id: JobId::new(),
            project_id: "acme".into(),
            transition: lc.history()[0].clone(),
        }));
        drop(trail);
        handle.await.unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        let entry: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(entry["event"], "job_transition");
        assert_eq!(entry["data"]["from"], "queued");
        assert_eq!(entry["data"]["to"], "running");
        assert_eq!(entry["data"]["project_id"], "acme");
    }
}
