//! Operator identity extraction and rate limiting middleware
//!
//! Authentication happens upstream; this layer consumes the already
//! authenticated operator identity from `X-Operator-Id` (or the bearer token
//! subject forwarded by the gateway) and applies the per-operator rate limit.

use crate::error::ApiError;
use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Fallback identity for single-operator deployments
const DEFAULT_OPERATOR: &str = "default";

#[derive(Debug, Clone)]
pub struct OperatorContext {
    pub id: String,
}

pub async fn operator_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let operator_id =
        extract_operator_id(&req).unwrap_or_else(|| DEFAULT_OPERATOR.to_string());

    if !state.operator_limiter.admit(&operator_id) {
        return ApiError::rate_limited().into_response();
    }

    req.extensions_mut().insert(OperatorContext { id: operator_id });
    next.run(req).await
}

fn extract_operator_id(req: &Request<Body>) -> Option<String> {
    if let Some(value) = req.headers().get("X-Operator-Id") {
        if let Ok(s) = value.to_str() {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }

    // Opaque bearer tokens double as operator handles behind the gateway
    if let Some(value) = req.headers().get(axum::http::header::AUTHORIZATION) {
        if let Ok(s) = value.to_str() {
            if let Some(token) = s.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}
