pub mod types;
pub mod publisher;

pub use types::{Event, EventPayload};
pub use publisher::EventPublisher;
