pub mod state_machine;

pub use state_machine::{JobLifecycle, JobStatus, LifecycleEvent, TransitionRecord};
