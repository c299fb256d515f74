pub mod core;
pub mod eta;
pub mod queue;

pub use self::core::{CancelOutcome, HeartbeatAck, JobScheduler, JobView, ProjectStatus, ReportOutcome};
pub use queue::ReadyQueue;
