use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::PickerError;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Picker(#[from] PickerError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Picker(err) => match err {
                PickerError::UnknownModel(_) | PickerError::FileNotFound(_) => StatusCode::NOT_FOUND,
                PickerError::EmptyQuery
                | PickerError::MissingField { .. }
                | PickerError::FieldNotText { .. }
                | PickerError::DimensionMismatch { .. }
                | PickerError::Parse { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PickerError::Io { .. } | PickerError::Encoding { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::Picker(err) => match err {
                PickerError::UnknownModel(_) => "UNKNOWN_MODEL",
                PickerError::FileNotFound(_) => "FILE_NOT_FOUND",
                PickerError::Parse { .. } => "PARSE_ERROR",
                PickerError::Io { .. } => "IO_ERROR",
                PickerError::MissingField { .. } => "MISSING_FIELD",
                PickerError::FieldNotText { .. } => "FIELD_NOT_TEXT",
                PickerError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
                PickerError::EmptyQuery => "EMPTY_QUERY",
                PickerError::Encoding { .. } => "ENCODING_ERROR",
            },
            ServerError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code = self.error_code(), %message, "request failed");
        } else {
            tracing::warn!(code = self.error_code(), %message, "request rejected");
        }

        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": message,
            }
        }));
        (status, body).into_response()
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::BadRequest(format!("JSON parse error: {err}"))
    }
}
