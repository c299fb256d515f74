use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use crate::api::models::{PlanBody, ProjectLimitBody};
use crate::api::AppState;
use crate::errors::ApexError;
use crate::planner::PlanRequest;

pub async fn create_plan(
    State(state): State<AppState>,
    Json(body): Json<PlanBody>,
) -> Result<(StatusCode, Json<Value>), ApexError> {
    let request = PlanRequest { test_cases: body.test_cases };
    if body.submit {
        let submitted = state.orchestrator.plan_and_submit(&body.project, &request).await?;
        Ok((StatusCode::CREATED, Json(serde_json::to_value(submitted)?)))
    } else {
        let plan = state.orchestrator.plan(&body.project, &request)?;
        Ok((StatusCode::OK, Json(serde_json::to_value(plan)?)))
    }
}

pub async fn get_project_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApexError> {
    let status = state.orchestrator.project_status(&id).await;
    Ok(Json(serde_json::to_value(status)?))
}

pub async fn set_project_limit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ProjectLimitBody>,
) -> Result<Json<Value>, ApexError> {
    state.orchestrator.set_project_limit(&id, body.max_concurrency).await?;
    Ok(Json(json!({ "project_id": id, "max_concurrency": body.max_concurrency })))
}
