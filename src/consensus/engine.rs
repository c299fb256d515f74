use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::audit::{AuditRecord, AuditTrail};
use crate::config::ConsensusConfig;
use crate::errors::ApexError;
use crate::events::{EventPayload, EventPublisher};
use crate::models::{
    Disposition, Finding, FindingDraft, FindingId, FindingStatus, JobId, Verdict, Vote, VoteDraft,
};

/// Tolerance for threshold comparisons on summed confidences.
const EPSILON: f64 = 1e-9;

/// Votes and current state for one finding.
#[derive(Debug)]
struct Ballot {
    finding: Finding,
    votes: Vec<Vote>,
    /// Index into `votes` of each voter's latest vote.
    latest: BTreeMap<String, usize>,
}

impl Ballot {
    fn current_votes(&self) -> impl Iterator<Item = &Vote> {
        self.latest.values().map(|&i| &self.votes[i])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tally {
    /// Weighted sum of the latest vote per voter.
    pub score: f64,
    pub confidence: f64,
    /// Distinct voters, abstentions included.
    pub voters: usize,
    /// Voters with an accept or reject verdict.
    pub counted: usize,
}

/// Score a set of latest-per-voter votes.
pub fn tally<'a>(votes: impl IntoIterator<Item = &'a Vote>) -> Tally {
    let mut score = 0.0;
    let mut voters = 0;
    let mut counted = 0;
    for vote in votes {
        voters += 1;
        if vote.verdict != Verdict::MoreInfo {
            counted += 1;
        }
        score += vote.confidence * vote.verdict.sign();
    }
    let confidence = if counted == 0 {
        0.0
    } else {
        (score.abs() / counted as f64).clamp(0.0, 1.0)
    };
    Tally { score, confidence, voters, counted }
}

/// Apply the acceptance threshold and quorum to a tally.
pub fn disposition(tally: &Tally, config: &ConsensusConfig) -> Disposition {
    if tally.voters < config.quorum {
        return Disposition::Pending;
    }
    if tally.score >= config.accept_threshold - EPSILON {
        Disposition::Validated
    } else if tally.score <= -config.accept_threshold + EPSILON {
        Disposition::FalsePositive
    } else {
        Disposition::Pending
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub finding_id: FindingId,
    pub disposition: Disposition,
    pub status: FindingStatus,
    pub score: f64,
    pub confidence: f64,
    pub votes: usize,
    /// True only for the call that moved the finding out of `tentative`.
    pub finalized_now: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    /// False when the vote repeated the voter's latest vote exactly.
    pub recorded: bool,
    pub decision: Decision,
}

#[derive(Debug, Clone, Serialize)]
pub struct FindingDetail {
    pub finding: Finding,
    pub votes: Vec<Vote>,
    pub tally: Tally,
}

/// Collects votes on candidate findings and finalizes them by weighted consensus.
pub struct ConsensusEngine {
    ballots: DashMap<FindingId, Arc<Mutex<Ballot>>>,
    config: ConsensusConfig,
    events: EventPublisher,
    audit: AuditTrail,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig, events: EventPublisher, audit: AuditTrail) -> Self {
        Self { ballots: DashMap::new(), config, events, audit }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Register a new tentative finding.
    pub fn create_finding(
        &self,
        draft: FindingDraft,
        project_id: &str,
        job_id: Option<JobId>,
        test_case_id: Option<String>,
    ) -> Result<Finding, ApexError> {
        if draft.title.trim().is_empty() {
            return Err(ApexError::Validation("finding title must not be empty".into()));
        }
        if !(0.0..=10.0).contains(&draft.risk_score) {
            return Err(ApexError::Validation(format!(
                "risk score {} outside 0..=10",
                draft.risk_score
            )));
        }
        let finding = Finding::from_draft(draft, project_id, job_id, test_case_id);
        let ballot = Ballot { finding: finding.clone(), votes: Vec::new(), latest: BTreeMap::new() };
        self.ballots.insert(finding.id, Arc::new(Mutex::new(ballot)));

        info!(finding_id = %finding.id, project_id, title = %finding.title, "Finding created");
        self.events.publish(EventPayload::FindingCreated {
            finding_id: finding.id,
            job_id,
            project_id: finding.project_id.clone(),
            title: finding.title.clone(),
            severity: finding.severity,
        });
        Ok(finding)
    }

    fn ballot(&self, finding_id: FindingId) -> Option<Arc<Mutex<Ballot>>> {
        self.ballots.get(&finding_id).map(|b| b.value().clone())
    }

    /// Record a vote and re-evaluate the finding.
    pub async fn record_vote(
        &self,
        finding_id: FindingId,
        voter_id: &str,
        vote: VoteDraft,
    ) -> Result<VoteOutcome, ApexError> {
        if !(0.0..=1.0).contains(&vote.confidence) {
            return Err(ApexError::InvalidConfidence(vote.confidence));
        }
        if voter_id.trim().is_empty() {
            return Err(ApexError::Validation("voter_id must not be empty".into()));
        }
        let ballot = self
            .ballot(finding_id)
            .ok_or_else(|| ApexError::UnknownFinding(finding_id.to_string()))?;
        let mut ballot = ballot.lock().await;

        let duplicate = ballot
            .latest
            .get(voter_id)
            .map(|&i| ballot.votes[i].same_content(voter_id, &vote))
            .unwrap_or(false);
        if duplicate {
            debug!(%finding_id, voter_id, "Duplicate vote ignored");
            let decision = self.evaluate(&mut ballot);
            return Ok(VoteOutcome { recorded: false, decision });
        }

        let recorded = Vote {
            finding_id,
            voter_id: voter_id.to_string(),
            verdict: vote.verdict,
            confidence: vote.confidence,
            rationale: vote.rationale,
            timestamp: Utc::now(),
        };
        let index = ballot.votes.len();
        ballot.votes.push(recorded.clone());
        let replaced = ballot.latest.insert(voter_id.to_string(), index).is_some();

        info!(
            %finding_id,
            voter_id,
            verdict = ?recorded.verdict,
            confidence = recorded.confidence,
            replaced,
            "Vote recorded"
        );
        self.events.publish(EventPayload::VoteRecorded {
            finding_id,
            voter_id: recorded.voter_id.clone(),
            verdict: recorded.verdict,
            confidence: recorded.confidence,
        });
        self.audit.record(AuditRecord::Vote(recorded));

        let decision = self.evaluate(&mut ballot);
        Ok(VoteOutcome { recorded: true, decision })
    }

    /// Current disposition. Unknown findings are reported as pending.
    pub async fn decide(&self, finding_id: FindingId) -> Decision {
        match self.ballot(finding_id) {
            Some(ballot) => {
                let mut ballot = ballot.lock().await;
                self.evaluate(&mut ballot)
            }
            None => Decision {
                finding_id,
                disposition: Disposition::Pending,
                status: FindingStatus::Tentative,
                score: 0.0,
                confidence: 0.0,
                votes: 0,
                finalized_now: false,
            },
        }
    }

    fn evaluate(&self, ballot: &mut Ballot) -> Decision {
        let tally = tally(ballot.current_votes());
        let finding = &mut ballot.finding;

        if finding.is_decided() {
            // Finalized findings never move automatically.
            let disposition = match finding.status {
                FindingStatus::FalsePositive => Disposition::FalsePositive,
                _ => Disposition::Validated,
            };
            return Decision {
                finding_id: finding.id,
                disposition,
                status: finding.status,
                score: tally.score,
                confidence: finding.confidence,
                votes: tally.voters,
                finalized_now: false,
            };
        }

        let disposition = disposition(&tally, &self.config);
        finding.confidence = tally.confidence;
        let finalized_now = disposition != Disposition::Pending;
        if finalized_now {
            finding.status = match disposition {
                Disposition::Validated => FindingStatus::Validated,
                _ => FindingStatus::FalsePositive,
            };
            finding.decided_at = Some(Utc::now());

            info!(
                finding_id = %finding.id,
                status = %finding.status,
                score = tally.score,
                confidence = tally.confidence,
                votes = tally.voters,
                "Finding finalized"
            );
            let payload = match disposition {
                Disposition::Validated => EventPayload::FindingValidated {
                    finding_id: finding.id,
                    project_id: finding.project_id.clone(),
                    score: tally.score,
                    confidence: tally.confidence,
                },
                _ => EventPayload::FindingFalsePositive {
                    finding_id: finding.id,
                    project_id: finding.project_id.clone(),
                    score: tally.score,
                    confidence: tally.confidence,
                },
            };
            self.events.publish(payload);
            self.audit.record(AuditRecord::Decision {
                finding_id: finding.id,
                disposition,
                score: tally.score,
                confidence: tally.confidence,
                votes: tally.voters,
            });
        }

        Decision {
            finding_id: finding.id,
            disposition,
            status: finding.status,
            score: tally.score,
            confidence: tally.confidence,
            votes: tally.voters,
            finalized_now,
        }
    }

    /// Triage a decided finding as accepted risk or fixed.
    pub async fn set_status(
        &self,
        finding_id: FindingId,
        status: FindingStatus,
    ) -> Result<Finding, ApexError> {
        let ballot = self
            .ballot(finding_id)
            .ok_or_else(|| ApexError::UnknownFinding(finding_id.to_string()))?;
        let mut ballot = ballot.lock().await;
        let from = ballot.finding.status;

        let allowed = match status {
            FindingStatus::Accepted => from == FindingStatus::Validated,
            FindingStatus::Fixed => matches!(from, FindingStatus::Validated | FindingStatus::Accepted),
            _ => {
                return Err(ApexError::Validation(format!(
                    "status '{}' is set by consensus, not by triage",
                    status
                )))
            }
        };
        if !allowed {
            return Err(ApexError::InvalidTransition {
                from: from.to_string(),
                event: status.to_string(),
            });
        }
        ballot.finding.status = status;
        info!(%finding_id, from = %from, to = %status, "Finding triaged");
        Ok(ballot.finding.clone())
    }

    pub async fn get(&self, finding_id: FindingId) -> Result<FindingDetail, ApexError> {
        let ballot = self
            .ballot(finding_id)
            .ok_or_else(|| ApexError::UnknownFinding(finding_id.to_string()))?;
        let ballot = ballot.lock().await;
        Ok(FindingDetail {
            finding: ballot.finding.clone(),
            votes: ballot.votes.clone(),
            tally: tally(ballot.current_votes()),
        })
    }

    /// Findings filtered by project and status, oldest first.
    pub async fn list(
        &self,
        project_id: Option<&str>,
        status: Option<FindingStatus>,
    ) -> Vec<Finding> {
        let ballots: Vec<Arc<Mutex<Ballot>>> =
            self.ballots.iter().map(|e| e.value().clone()).collect();
        let mut findings = Vec::new();
        for ballot in ballots {
            let ballot = ballot.lock().await;
            let f = &ballot.finding;
            if project_id.map_or(true, |p| f.project_id == p) && status.map_or(true, |s| f.status == s) {
                findings.push(f.clone());
            }
        }
        findings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        findings
    }
}
