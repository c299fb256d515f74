use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::finding::FindingId;

/// A tester's opinion on a candidate finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accept,
    Reject,
    /// Abstains from the score but still counts toward quorum.
    MoreInfo,
}

impl Verdict {
    pub fn sign(&self) -> f64 {
        match self {
            Verdict::Accept => 1.0,
            Verdict::Reject => -1.0,
            Verdict::MoreInfo => 0.0,
        }
    }
}

/// The voter-supplied part of a vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteDraft {
    pub verdict: Verdict,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Vote submission as it arrives over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteSubmission {
    pub voter_id: String,
    #[serde(flatten)]
    pub vote: VoteDraft,
}

/// A recorded vote. Never edited once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub finding_id: FindingId,
    pub voter_id: String,
    pub verdict: Verdict,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Vote {
    /// Same voter, same verdict, same confidence, same rationale.
    pub fn same_content(&self, voter_id: &str, draft: &VoteDraft) -> bool {
        self.voter_id == voter_id
            && self.verdict == draft.verdict
            && self.confidence.to_bits() == draft.confidence.to_bits()
            && self.rationale == draft.rationale
    }
}

/// Outcome of a consensus decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Validated,
    FalsePositive,
    Pending,
}
