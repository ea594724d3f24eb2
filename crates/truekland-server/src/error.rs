use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use truekland_shared::{SessionError, TransitionError, ValidationErrors};
use truekland_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Upload storage error: {0}")]
    UploadStorage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ServerError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ServerError::UploadStorage(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ServerError::Validation(fields) => serde_json::json!({
                "error": self.to_string(),
                "fields": fields,
            }),
            ServerError::UploadStorage(detail) => {
                tracing::error!(error = %detail, "Upload storage failure");
                serde_json::json!({ "error": "Upload storage error" })
            }
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal server error");
                serde_json::json!({ "error": "Internal server error" })
            }
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ServerError {
    fn from(errors: ValidationErrors) -> Self {
        ServerError::Validation(errors)
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServerError::NotFound("record".into()),
            StoreError::Conflict(msg) => ServerError::Conflict(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<SessionError> for ServerError {
    fn from(_: SessionError) -> Self {
        ServerError::Unauthorized
    }
}

impl From<TransitionError> for ServerError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::WrongRole { .. } => ServerError::Forbidden(err.to_string()),
            _ => ServerError::Conflict(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use truekland_shared::ExchangeStatus;

    #[test]
    fn test_status_codes() {
        assert_eq!(ServerError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ServerError::from(StoreError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::from(StoreError::Conflict("dup".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::from(SessionError::Expired).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_transition_errors() {
        let terminal = TransitionError::Terminal(ExchangeStatus::Completed);
        assert_eq!(ServerError::from(terminal).status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.push("title", "too short");
        let response = ServerError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["fields"][0]["field"], "title");
    }
}
