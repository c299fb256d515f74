pub mod engine;

pub use engine::{ConsensusEngine, Decision, FindingDetail, Tally, VoteOutcome};
