//! API error envelope

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lendcase_core::error::CaseError;
use serde::Serialize;

/// API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

/// Error response body: `{ "error": { code, message, details? } }`
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorEnvelope,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn case_not_found(case_id: impl std::fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "CASE_NOT_FOUND",
            format!("Case '{case_id}' not found"),
        )
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn precondition(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, message)
    }

    pub fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "Rate limit exceeded",
        )
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// Attach structured details to the envelope
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: ErrorEnvelope {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        });
        (self.status, body).into_response()
    }
}

impl From<CaseError> for ApiError {
    fn from(err: CaseError) -> Self {
        match &err {
            CaseError::Validation { message } => ApiError::validation(message.clone()),
            CaseError::Duplicate { existing_id, .. } => {
                ApiError::conflict("DUPLICATE_DOCUMENT", err.to_string())
                    .with_details(serde_json::json!({ "existing_id": existing_id }))
            }
            CaseError::Precondition { missing } => {
                ApiError::precondition("PRECONDITION_FAILED", format!("Missing prerequisite: {missing}"))
            }
            CaseError::NotFound { entity, id } => ApiError::not_found(
                format!("{}_NOT_FOUND", entity.to_uppercase()),
                format!("{entity} '{id}' not found"),
            ),
            CaseError::ExternalTransient { .. } | CaseError::ExternalPermanent { .. } => {
                ApiError::upstream(err.to_string())
            }
            CaseError::Internal { .. } => ApiError::internal(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::internal(format!("database error: {err}"))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::validation(format!("JSON error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_error_mapping() {
        let e: ApiError = CaseError::validation("bad extension").into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, "VALIDATION_ERROR");

        let e: ApiError = CaseError::precondition("feature vector").into();
        assert_eq!(e.status, StatusCode::UNPROCESSABLE_ENTITY);

        let e: ApiError = CaseError::not_found("Case", "CASE-1").into();
        assert_eq!(e.code, "CASE_NOT_FOUND");
    }
}
