use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use crate::api::AppState;
use crate::errors::ApexError;
use crate::models::TestCase;

pub async fn list_test_cases(State(state): State<AppState>) -> Json<Value> {
    let catalog = state.orchestrator.catalog();
    let test_cases: Vec<&TestCase> = catalog.iter().collect();
    Json(json!({ "test_cases": test_cases, "total": catalog.len() }))
}

pub async fn get_test_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TestCase>, ApexError> {
    state
        .orchestrator
        .catalog()
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(ApexError::UnknownTestCase(id))
}
