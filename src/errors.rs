use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of every non-auth error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Not Found",
    "message": "Not found: Store 550e8400-e29b-41d4-a716-446655440000 not found",
    "request_id": "3f1c9a52-8d7e-4b61-a0f4-2c5e7d9b1a30",
    "timestamp": "2026-03-14T08:15:00Z"
}))]
pub struct ErrorResponse {
    /// Canonical reason phrase of the status code
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload failed field validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Well-formed request that the current data does not allow
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Password hashing failed: {0}")]
    HashError(String),

    /// Media files could not be written
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Usable directly as `map_err(ServiceError::db_error)`.
    pub fn db_error(err: DbErr) -> Self {
        ServiceError::DatabaseError(err)
    }

    pub fn not_found(resource: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", resource, id))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_)
            | Self::HashError(_)
            | Self::StorageError(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Server-side failures are reported generically; details go to the log only.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::HashError(_) | Self::StorageError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rstest::rstest;

    #[tokio::test]
    async fn error_body_carries_scoped_request_id() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("req-7781"),
            async { ServiceError::not_found("Delivery", "DEL-1A2B3C4D").into_response() },
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-7781"));
        assert_eq!(payload.error, "Not Found");
        assert_eq!(payload.message, "Not found: Delivery DEL-1A2B3C4D not found");
    }

    #[rstest]
    #[case(ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case(ServiceError::ValidationError("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::BadRequest("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED)]
    #[case(ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN)]
    #[case(ServiceError::Conflict("x".into()), StatusCode::CONFLICT)]
    #[case(ServiceError::StorageError("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(
        ServiceError::db_error(DbErr::Custom("boom".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    fn status_mapping(#[case] err: ServiceError, #[case] status: StatusCode) {
        assert_eq!(err.status_code(), status);
    }

    #[test]
    fn server_failures_hide_details() {
        assert_eq!(
            ServiceError::HashError("salt too short".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::db_error(DbErr::Custom("no such table: stores".into()))
                .response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::BadRequest("No signature provided.".into()).response_message(),
            "Bad request: No signature provided."
        );
    }
}
