pub mod registry;

pub use registry::{Assignment, Tester, TesterOutput, TesterRegistry, TesterRole};
