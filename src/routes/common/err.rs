use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub(crate) enum AppError {
    AnyHow(anyhow::Error),
    BadRequest(String),
    Conflict(String),
    Forbidden(String),
    NotFound(String),
    Unauthorized(String),
    Validation(Vec<String>),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            Self::AnyHow(e) => {
                tracing::error!(error = ?e, "unhandled server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            Self::BadRequest(e) => (StatusCode::BAD_REQUEST, e, None),
            Self::Conflict(e) => (StatusCode::CONFLICT, e, None),
            Self::Forbidden(e) => (StatusCode::FORBIDDEN, e, None),
            Self::NotFound(e) => (StatusCode::NOT_FOUND, e, None),
            Self::Unauthorized(e) => (StatusCode::UNAUTHORIZED, e, None),
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation error".to_string(),
                Some(errors),
            ),
        };
        let mut body = json!({ "message": message });
        if let Some(errors) = errors {
            body["errors"] = json!(errors);
        }
        (status, Json(body)).into_response()
    }
}

impl<T: Into<anyhow::Error>> From<T> for AppError {
    fn from(value: T) -> Self {
        Self::AnyHow(value.into())
    }
}
