use axum::{extract::State, Json};
use serde_json::{json, Value};
use crate::api::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "apex",
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": option_env!("APEX_GIT_HASH"),
        "built_at": env!("APEX_BUILD_TIMESTAMP"),
        "last_event_seq": state.orchestrator.events().last_seq(),
    }))
}
