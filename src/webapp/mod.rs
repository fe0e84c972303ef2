pub mod handlers;
pub mod models;
pub mod state;
pub mod trace;

pub use models::{error_bad_request, error_response, ErrorResponse};
pub use state::AppState;

use std::sync::Arc;

use anyhow::Result;
use axum::{extract::DefaultBodyLimit, middleware, routing::get, routing::post, Json, Router};
use clap::Args;
use utoipa::OpenApi;

use crate::executor::Executor;
use crate::prelude::parse_size;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "execbox",
        version = env!("CARGO_PKG_VERSION"),
        description = "Runs an uploaded executable as a child process with a wall-clock limit \
                       and capped stdout/stderr, and reports what happened.",
        license(name = "MIT OR Apache-2.0"),
    ),
    paths(
        handlers::execute::execute_handler,
        handlers::health::health_handler,
    ),
    components(
        schemas(
            models::ErrorResponse,
            models::ExecuteRequest,
            handlers::health::HealthResponse,
            crate::os::ExecutionResult,
            crate::limits::Limits,
        )
    ),
    tags(
        (name = "Execute", description = "Run executables"),
        (name = "Health", description = "Service health and status endpoints"),
    )
)]
struct ApiDoc;

async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Creates the axum app with all routes and state configured
pub fn create_app(executor: Arc<Executor>, request_limit: usize) -> Router {
    let state = AppState::new(executor);

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/execute", post(handlers::execute::execute_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
        .layer(DefaultBodyLimit::max(request_limit))
        .layer(middleware::from_fn(trace::trace_request))
        .with_state(state)
}

const DEFAULT_PORT: u16 = 8080;

/// Extra room on top of the payload limits for JSON framing
const BODY_OVERHEAD: usize = 64 * 1024;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "EXECBOX_HOST")]
    pub host: String,

    /// Write process ID to the specified file
    #[arg(long, value_name = "./pid.file")]
    pub pid: Option<String>,

    /// Write readiness marker to the specified file once server is listening
    #[arg(long)]
    pub ready_file: Option<String>,

    /// Maximum request body size (e.g. "4MB", "4194304")
    ///
    /// Defaults to MAX_EXECUTABLE + MAX_CALLDATA plus 64KB.
    #[arg(long, value_name = "SIZE")]
    pub request_limit: Option<String>,
}

pub async fn run(args: ServeArgs, config: &crate::config::GlobalConfig) -> Result<()> {
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let limits = config.limits;

    let request_limit = match &args.request_limit {
        Some(s) => parse_size(s).map_err(|e| anyhow::anyhow!("Invalid --request-limit value: {}", e))? as usize,
        None => limits
            .max_executable_bytes
            .saturating_add(limits.max_calldata_bytes)
            .saturating_add(BODY_OVERHEAD),
    };

    if let Some(pid_file) = &args.pid {
        std::fs::write(pid_file, std::process::id().to_string())?;
    }

    let work_dir = config.work_dir();
    std::fs::create_dir_all(&work_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create work dir {}: {}", work_dir.display(), e))?;

    let executor = Arc::new(config.executor());
    let app = create_app(executor, request_limit);

    let addr = format!("{}:{}", args.host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        listen = %listener.local_addr()?,
        work_dir = %work_dir.display(),
        kill_mode = ?config.kill_mode,
        max_timeout_ms = limits.max_timeout_millis,
        max_stdout = limits.max_stdout_bytes,
        max_stderr = limits.max_stderr_bytes,
        request_limit,
        "Server started"
    );

    if let Some(ready_file) = &args.ready_file {
        std::fs::write(ready_file, format!("ready {}", std::process::id()))?;
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
