pub mod dispatcher;
pub mod orchestrator;

pub use dispatcher::Dispatcher;
pub use orchestrator::{Orchestrator, ReportSummary, SubmittedPlan};
