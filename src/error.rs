use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// ApiError
///
/// The single failure type returned by every handler. Each variant maps to one
/// HTTP status; see [`ApiError::status`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// No record of `entity` matched `field = value`.
    #[error("{entity} was not found for parameters {{{field}={value}}}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// No valid principal accompanied the request.
    #[error("full authentication is required to access this resource")]
    AuthenticationRequired,

    /// A principal was present but the policy denied the action.
    #[error("access is denied")]
    AuthorizationDenied,

    #[error("validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl ToString) -> Self {
        ApiError::NotFound {
            entity,
            field,
            value: value.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::ValidationFailed(vec![message.into()])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::AuthorizationDenied => StatusCode::FORBIDDEN,
            ApiError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::Persistence(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Extractor rejections are malformed input: an unparseable body, query string
// or path segment. They share the 400 shape of every other validation failure.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

/// ErrorBody
///
/// JSON shape of every error response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, errors) = match &self {
            // Store details stay in the logs.
            ApiError::Persistence(e) => {
                tracing::error!("persistence failure: {:?}", e);
                ("an internal error occurred".to_string(), Vec::new())
            }
            ApiError::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                ("an internal error occurred".to_string(), Vec::new())
            }
            ApiError::ValidationFailed(violations) => (self.to_string(), violations.clone()),
            _ => (self.to_string(), Vec::new()),
        };

        let body = ErrorBody {
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_entity_field_and_value() {
        let err = ApiError::not_found("User", "id", 42);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "User was not found for parameters {id=42}");
    }

    #[test]
    fn statuses_distinguish_authentication_from_authorization() {
        assert_eq!(ApiError::AuthenticationRequired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::AuthorizationDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Persistence(sqlx::Error::PoolTimedOut).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
