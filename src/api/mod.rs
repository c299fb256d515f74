pub mod errors;
pub mod models;
pub mod routes;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/catalog", get(routes::catalog::list_test_cases))
        .route("/api/catalog/:id", get(routes::catalog::get_test_case))
        .route("/api/plans", post(routes::projects::create_plan))
        .route("/api/jobs", post(routes::jobs::submit_job).get(routes::jobs::list_jobs))
        .route("/api/jobs/:id", get(routes::jobs::get_job))
        .route("/api/jobs/:id/history", get(routes::jobs::get_job_history))
        .route("/api/jobs/:id/cancel", post(routes::jobs::cancel_job))
        .route("/api/jobs/:id/heartbeat", post(routes::jobs::heartbeat))
        .route("/api/jobs/:id/report", post(routes::jobs::report_result))
        .route("/api/testers/:role/claim", post(routes::testers::claim_job))
        .route("/api/findings", get(routes::findings::list_findings))
        .route("/api/findings/:id", get(routes::findings::get_finding))
        .route("/api/findings/:id/votes", post(routes::findings::submit_vote))
        .route("/api/findings/:id/status", put(routes::findings::update_status))
        .route("/api/projects/:id/status", get(routes::projects::get_project_status))
        .route("/api/projects/:id/limit", put(routes::projects::set_project_limit))
        .route("/api/events", get(routes::events::list_events))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
