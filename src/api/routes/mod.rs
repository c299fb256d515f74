pub mod catalog;
pub mod events;
pub mod findings;
pub mod health;
pub mod jobs;
pub mod projects;
pub mod testers;
