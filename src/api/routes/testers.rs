use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crate::agents::TesterRole;
use crate::api::models::AssignmentResponse;
use crate::api::AppState;
use crate::errors::ApexError;

/// Pull-mode claim. `204 No Content` when nothing is admissible for the role.
pub async fn claim_job(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Response, ApexError> {
    let role: TesterRole = role.parse()?;
    match state.orchestrator.claim(role).await {
        Some(assignment) => Ok(Json(AssignmentResponse::from(assignment)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
