use axum::{http::StatusCode, response::IntoResponse, Json};
use compat_catalog::CatalogError;
use serde_json::json;
use tracing::error;

/// HTTP-facing wrapper over catalog errors.
pub struct ApiError(pub CatalogError);

impl From<CatalogError> for ApiError {
    fn from(error: CatalogError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self.0 {
            CatalogError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CatalogError::InvalidFeed(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            other => {
                error!("Internal error serving request: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
