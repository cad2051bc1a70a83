use crate::dto::ErrorRes;
use api_shared::AuthError;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use meditache_core::MeditacheError;
use meditache_files::FilesError;

/// Error returned by every handler, rendered as `(status, Json<ErrorRes>)`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{} not found: {}", entity, id))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    }
}

impl From<MeditacheError> for ApiError {
    fn from(err: MeditacheError) -> Self {
        match err {
            MeditacheError::Validation(_) => Self::bad_request(err.to_string()),
            MeditacheError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            MeditacheError::Conflict(_) => Self::new(StatusCode::CONFLICT, err.to_string()),
            MeditacheError::InvalidConfig(_) | MeditacheError::Store(_) => {
                tracing::error!("request failed: {}", err);
                Self::internal()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = if err.is_forbidden() {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::UNAUTHORIZED
        };
        Self::new(status, err.to_string())
    }
}

impl From<FilesError> for ApiError {
    fn from(err: FilesError) -> Self {
        match err {
            FilesError::EmptyFile(_) => Self::bad_request(err.to_string()),
            _ => {
                tracing::error!("upload storage failed: {}", err);
                Self::internal()
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorRes {
            status_code: self.status.as_u16(),
            error: self
                .status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
