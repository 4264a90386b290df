use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use braid_engine::ServiceError;

/// HTTP-facing wrapper over the service error taxonomy.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl ApiError {
    pub fn unauthorized() -> Self {
        Self(ServiceError::Unauthorized)
    }

    fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
