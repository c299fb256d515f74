use super::types::ApexError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl ApexError {
    /// Classify this error to determine its type and whether a failed job
    /// may be re-attempted because of it.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Transient execution errors, absorbed by the retry policy
            ApexError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            ApexError::Execution(_) => ErrorClassification {
                error_type: "ExecutionError",
                retryable: true,
            },
            ApexError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            ApexError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },

            // Terminal execution errors
            ApexError::Rejected(_) => ErrorClassification {
                error_type: "RejectedError",
                retryable: false,
            },
            ApexError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: false,
            },

            // Validation errors never reach the retry policy but classify
            // as non-retryable in case a tester surfaces one.
            ApexError::Validation(_) => ErrorClassification {
                error_type: "ValidationError",
                retryable: false,
            },
            ApexError::UnknownJob(_) => ErrorClassification {
                error_type: "UnknownJobError",
                retryable: false,
            },
            ApexError::UnknownFinding(_) => ErrorClassification {
                error_type: "UnknownFindingError",
                retryable: false,
            },
            ApexError::UnknownTestCase(_) => ErrorClassification {
                error_type: "UnknownTestCaseError",
                retryable: false,
            },
            ApexError::InvalidConfidence(_) => ErrorClassification {
                error_type: "InvalidConfidenceError",
                retryable: false,
            },
            ApexError::InvalidTransition { .. } => ErrorClassification {
                error_type: "InvalidTransitionError",
                retryable: false,
            },
            ApexError::AlreadyTerminal(_) => ErrorClassification {
                error_type: "AlreadyTerminalError",
                retryable: false,
            },
            ApexError::InvalidScope(_) => ErrorClassification {
                error_type: "InvalidScopeError",
                retryable: false,
            },
            ApexError::MissingCredential(_) => ErrorClassification {
                error_type: "MissingCredentialError",
                retryable: false,
            },
            ApexError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            ApexError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },
            ApexError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },
        }
    }

    /// Validation-class errors are rejected synchronously and surfaced verbatim.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ApexError::Validation(_)
                | ApexError::UnknownJob(_)
                | ApexError::UnknownFinding(_)
                | ApexError::UnknownTestCase(_)
                | ApexError::InvalidConfidence(_)
                | ApexError::InvalidScope(_)
                | ApexError::MissingCredential(_)
        )
    }
}
