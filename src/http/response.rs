//! API error responses.
//!
//! Every handler failure maps to a JSON body with a stable status code.
//! Funding step failures (rejection, revert) are not errors at this layer —
//! they travel inside the outcome body — so the mappings here cover
//! validation, state conflicts, and infrastructure failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::funding::types::FundingError;

/// A handler error with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self { status: StatusCode::SERVICE_UNAVAILABLE, message: message.into() }
    }
}

impl From<FundingError> for ApiError {
    fn from(err: FundingError) -> Self {
        let status = match &err {
            FundingError::InvalidAmount(_) | FundingError::ZeroAmount => StatusCode::BAD_REQUEST,
            FundingError::Busy | FundingError::InvalidState { .. } => StatusCode::CONFLICT,
            FundingError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            FundingError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            FundingError::Rejected(_)
            | FundingError::Reverted(_)
            | FundingError::Rpc(_)
            | FundingError::WrongChain { .. } => StatusCode::BAD_GATEWAY,
        };
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let e: ApiError = FundingError::ZeroAmount.into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);

        let e: ApiError = FundingError::Busy.into();
        assert_eq!(e.status, StatusCode::CONFLICT);

        let e: ApiError = FundingError::Timeout(15).into();
        assert_eq!(e.status, StatusCode::GATEWAY_TIMEOUT);

        let e: ApiError = FundingError::Rpc("down".into()).into();
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);
    }
}
