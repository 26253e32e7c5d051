//! Lendcase error taxonomy
//!
//! Every pipeline stage translates its failures into one of these variants
//! before persisting; only the taxonomy codes reach the operator.

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone)]
pub enum CaseError {
    /// Malformed input, size/extension limits, bad field values
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Content hash already present for the case
    #[error("Duplicate document: {content_hash}")]
    Duplicate { content_hash: String, existing_id: String },

    /// Stage requested before its prerequisites are met
    #[error("Precondition not met: {missing}")]
    Precondition { missing: String },

    /// Entity lookup failed
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Timeout or 5xx from a remote collaborator; retried per policy
    #[error("Transient upstream failure from {endpoint}: {message}")]
    ExternalTransient { endpoint: String, message: String },

    /// 4xx from a remote collaborator; persisted, never retried
    #[error("Permanent upstream failure from {endpoint}: {message}")]
    ExternalPermanent { endpoint: String, message: String },

    /// Invariant violation; the job fails but the case stays recoverable
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Core Result type alias
pub type Result<T> = std::result::Result<T, CaseError>;

impl CaseError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a duplicate-document error
    pub fn duplicate(content_hash: impl Into<String>, existing_id: impl Into<String>) -> Self {
        Self::Duplicate {
            content_hash: content_hash.into(),
            existing_id: existing_id.into(),
        }
    }

    /// Create a precondition error
    pub fn precondition(missing: impl Into<String>) -> Self {
        Self::Precondition {
            missing: missing.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a transient external error
    pub fn external_transient(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalTransient {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a permanent external error
    pub fn external_permanent(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalPermanent {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable taxonomy code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Duplicate { .. } => "DUPLICATE_DOCUMENT",
            Self::Precondition { .. } => "PRECONDITION_FAILED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ExternalTransient { .. } => "UPSTREAM_UNAVAILABLE",
            Self::ExternalPermanent { .. } => "UPSTREAM_REJECTED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether the job runner should retry after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalTransient { .. })
    }
}
