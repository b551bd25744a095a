use axum::{http::StatusCode, response::Response, Json};
use serde::Serialize;
use serde_json::Value;

/// Envelope every endpoint responds with: `{status, data, error}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub fn success<T: Serialize>(code: StatusCode, data: T) -> Response {
    use axum::response::IntoResponse;
    (
        code,
        Json(ApiResponse {
            status: "success",
            data: Some(data),
            error: None,
        }),
    )
        .into_response()
}

/// Success with `data: null` (logout, delete).
pub fn success_empty(code: StatusCode) -> Response {
    use axum::response::IntoResponse;
    (
        code,
        Json(ApiResponse::<Value> {
            status: "success",
            data: None,
            error: None,
        }),
    )
        .into_response()
}

pub fn error_body(message: impl Into<String>, details: Option<Value>) -> ApiResponse<Value> {
    ApiResponse {
        status: "error",
        data: None,
        error: Some(ErrorBody {
            message: message.into(),
            details,
        }),
    }
}
