use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use crate::errors::ApexError;

impl ApexError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApexError::UnknownJob(_)
            | ApexError::UnknownFinding(_)
            | ApexError::UnknownTestCase(_) => StatusCode::NOT_FOUND,
            ApexError::Validation(_)
            | ApexError::InvalidConfidence(_)
            | ApexError::InvalidScope(_)
            | ApexError::MissingCredential(_)
            | ApexError::Yaml(_)
            | ApexError::Json(_) => StatusCode::BAD_REQUEST,
            ApexError::AlreadyTerminal(_) | ApexError::InvalidTransition { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApexError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let error_type = self.classify().error_type;
        (status, Json(json!({"error": self.to_string(), "type": error_type}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApexError::UnknownJob("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApexError::InvalidConfidence(1.5).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApexError::AlreadyTerminal("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(ApexError::Internal("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
