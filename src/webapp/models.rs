use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::request::ValidationError;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "timeout field is missing from JSON request")]
    pub error: String,
}

pub fn error_response(code: StatusCode, message: &str) -> axum::response::Response {
    (code, Json(ErrorResponse { error: message.to_string() })).into_response()
}

pub fn error_bad_request(message: &str) -> axum::response::Response {
    error_response(StatusCode::BAD_REQUEST, message)
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> axum::response::Response {
        error_bad_request(&self.to_string())
    }
}

/// Body of `POST /execute`. Parsed by the request validator; this type
/// documents the accepted shape.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExecuteRequest {
    /// Base64-encoded executable, usually a script with a `#!` line
    #[schema(example = "IyEvYmluL3NoCmVjaG8gaGVsbG8K")]
    pub executable: String,
    /// Text written to the process's stdin
    #[schema(example = "bitcoin")]
    pub calldata: String,
    /// Wall-clock limit in milliseconds
    #[schema(example = 1000)]
    pub timeout: i64,
}
