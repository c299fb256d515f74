pub mod test_case;
pub mod project;
pub mod job;
pub mod finding;
pub mod vote;

pub use test_case::*;
pub use project::*;
pub use job::*;
pub use finding::*;
pub use vote::*;
