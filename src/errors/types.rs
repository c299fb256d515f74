use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApexError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Unknown finding: {0}")]
    UnknownFinding(String),

    #[error("Unknown test case: {0}")]
    UnknownTestCase(String),

    #[error("Invalid confidence {0}: must be within [0, 1]")]
    InvalidConfidence(f64),

    #[error("Invalid transition: cannot apply {event} while {from}")]
    InvalidTransition { from: String, event: String },

    #[error("Job {0} is already terminal")]
    AlreadyTerminal(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Tester rejected job: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
