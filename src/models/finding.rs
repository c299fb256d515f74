use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindingId(Uuid);

impl FindingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FindingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for FindingId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Severity level for a security finding, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    #[default]
    Tentative,
    Validated,
    FalsePositive,
    /// Risk accepted by the project owner.
    Accepted,
    Fixed,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tentative => "tentative",
            Self::Validated => "validated",
            Self::FalsePositive => "false_positive",
            Self::Accepted => "accepted",
            Self::Fixed => "fixed",
        }
    }
}

impl std::fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// Candidate finding as reported by a tester, before it has an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub risk_score: f64,
    #[serde(default)]
    pub location: Location,
}

/// A candidate or decided finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub job_id: Option<JobId>,
    pub project_id: String,
    pub test_case_id: Option<String>,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    /// 0..=10
    pub risk_score: f64,
    /// 0..=1, recomputed on each consensus decision.
    pub confidence: f64,
    pub status: FindingStatus,
    pub location: Location,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Finding {
    pub fn from_draft(
        draft: FindingDraft,
        project_id: impl Into<String>,
        job_id: Option<JobId>,
        test_case_id: Option<String>,
    ) -> Self {
        Self {
            id: FindingId::new(),
            job_id,
            project_id: project_id.into(),
            test_case_id,
            title: draft.title,
            description: draft.description,
            severity: draft.severity,
            risk_score: draft.risk_score.clamp(0.0, 10.0),
            confidence: 0.0,
            status: FindingStatus::Tentative,
            location: draft.location,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    pub fn is_decided(&self) -> bool {
        self.status != FindingStatus::Tentative
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_draft_starts_tentative() {
        let draft = FindingDraft {
            title: "SQL injection in id".into(),
            description: String::new(),
            severity: Severity::High,
            risk_score: 14.0,
            location: Location { url: Some("https://acme.test/item".into()), parameter: Some("id".into()) },
        };
        let finding = Finding::from_draft(draft, "acme", None, Some("WSTG-INPV-05".into()));
        assert_eq!(finding.status, FindingStatus::Tentative);
        assert_eq!(finding.risk_score, 10.0);
        assert_eq!(finding.confidence, 0.0);
        assert!(!finding.is_decided());
    }
}
