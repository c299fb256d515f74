use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use crate::api::models::{HeartbeatBody, JobListQuery, ReportBody};
use crate::api::AppState;
use crate::errors::ApexError;
use crate::models::{JobId, JobRequest};

fn parse_job_id(id: &str) -> Result<JobId, ApexError> {
    id.parse().map_err(|_| ApexError::UnknownJob(id.to_string()))
}

pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<JobRequest>,
) -> Result<(StatusCode, Json<Value>), ApexError> {
    let job_id = state.orchestrator.submit(request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "job_id": job_id, "status": "queued" }))))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> Json<Value> {
    let jobs = state.orchestrator.list_jobs(query.project_id.as_deref(), query.status).await;
    Json(json!({ "total": jobs.len(), "jobs": jobs }))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApexError> {
    let view = state.orchestrator.status(parse_job_id(&id)?).await?;
    Ok(Json(serde_json::to_value(view)?))
}

pub async fn get_job_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApexError> {
    let job_id = parse_job_id(&id)?;
    let history = state.orchestrator.history(job_id).await?;
    Ok(Json(json!({ "job_id": job_id, "history": history })))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApexError> {
    let job_id = parse_job_id(&id)?;
    let outcome = state.orchestrator.cancel(job_id).await?;
    Ok(Json(json!({ "job_id": job_id, "outcome": outcome })))
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<HeartbeatBody>,
) -> Result<Json<Value>, ApexError> {
    let ack = state.orchestrator.heartbeat(parse_job_id(&id)?, body.generation).await?;
    Ok(Json(serde_json::to_value(ack)?))
}

pub async fn report_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReportBody>,
) -> Result<Json<Value>, ApexError> {
    let summary = state
        .orchestrator
        .report(parse_job_id(&id)?, body.generation, body.report, body.tester_id.as_deref())
        .await?;
    Ok(Json(serde_json::to_value(summary)?))
}
