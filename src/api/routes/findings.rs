use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use crate::api::models::{FindingListQuery, FindingStatusBody};
use crate::api::AppState;
use crate::errors::ApexError;
use crate::models::{FindingId, VoteSubmission};

fn parse_finding_id(id: &str) -> Result<FindingId, ApexError> {
    id.parse().map_err(|_| ApexError::UnknownFinding(id.to_string()))
}

pub async fn list_findings(
    State(state): State<AppState>,
    Query(query): Query<FindingListQuery>,
) -> Json<Value> {
    let findings = state.orchestrator.findings(query.project_id.as_deref(), query.status).await;
    Json(json!({ "total": findings.len(), "findings": findings }))
}

pub async fn get_finding(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApexError> {
    let finding_id = parse_finding_id(&id)?;
    let detail = state.orchestrator.finding(finding_id).await?;
    let decision = state.orchestrator.decide(finding_id).await;
    Ok(Json(json!({
        "finding": detail.finding,
        "votes": detail.votes,
        "tally": detail.tally,
        "disposition": decision.disposition,
    })))
}

pub async fn submit_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<VoteSubmission>,
) -> Result<Json<Value>, ApexError> {
    let outcome = state
        .orchestrator
        .record_vote(parse_finding_id(&id)?, &body.voter_id, body.vote)
        .await?;
    Ok(Json(serde_json::to_value(outcome)?))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<FindingStatusBody>,
) -> Result<Json<Value>, ApexError> {
    let finding = state
        .orchestrator
        .set_finding_status(parse_finding_id(&id)?, body.status)
        .await?;
    Ok(Json(serde_json::to_value(finding)?))
}
