pub mod agents;
pub mod api;
pub mod audit;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod consensus;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod scheduler;
