use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};
use crate::api::models::EventsQuery;
use crate::api::AppState;

/// Pull consumers poll with the last `seq` they saw.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<Value> {
    let events = state.orchestrator.events().events_since(query.since, query.limit);
    Json(json!({
        "events": events,
        "last_seq": state.orchestrator.events().last_seq(),
    }))
}
