use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::super::AppState;

/// Run an executable and report its exit code and output
///
/// Execution failures (launch failure, timeout) are reported with status 200
/// and a non-empty `err`; only malformed requests get a 400.
#[utoipa::path(
    post,
    path = "/execute",
    tag = "Execute",
    request_body = crate::webapp::models::ExecuteRequest,
    responses(
        (status = 200, description = "Execution finished (see `err` for classified failures)", body = crate::os::ExecutionResult),
        (status = 400, description = "Invalid request", body = crate::webapp::ErrorResponse),
        (status = 413, description = "Request body too large")
    )
)]
pub async fn execute_handler(State(state): State<AppState>, body: Bytes) -> Response {
    match state.executor.execute(&body).await {
        Ok(result) => {
            if result.is_error() {
                tracing::info!(returncode = result.returncode, err = %result.err, "execution failed");
            } else {
                tracing::info!(returncode = result.returncode, "execution finished");
            }
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(e) => {
            tracing::debug!(error = %e, "rejected request");
            e.into_response()
        }
    }
}
