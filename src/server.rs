//! HTTP façade over the mediation API.
//!
//! Routes take their arguments as query parameters. Every handler is a
//! thin translation: extract parameters, call the [`Gateway`], then
//! serialize the result or map the error.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};
use crate::gateway::{Gateway, Health, Pong};
use crate::runner::{ExecutionResult, ProcessRunner};

/// Error body returned for every rejected or failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error class (`confinement`, `policy`, `timeout`, ...).
    pub error: String,
    /// Human-readable detail naming the rejected path or token.
    pub detail: String,
}

/// Wrapper mapping gateway errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            Error::Confinement { .. } | Error::Policy(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Io(_) | Error::Spawn { .. } | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = ErrorBody {
            error: self.0.kind().to_string(),
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
struct EchoParams {
    msg: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EchoResponse {
    pub echo: String,
}

#[derive(Debug, Deserialize)]
struct ReadParams {
    rel_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadResponse {
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct WriteParams {
    rel_path: String,
    content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteResponse {
    pub status: String,
    pub bytes: usize,
}

#[derive(Debug, Deserialize)]
struct ShellParams {
    cmd: String,
}

#[derive(Debug, Deserialize)]
struct VcsParams {
    rel_repo: String,
    sub_cmd: String,
}

/// Builds the router for a gateway.
pub fn router<R: ProcessRunner + 'static>(gateway: Arc<Gateway<R>>) -> Router {
    Router::new()
        .route("/ping", get(ping::<R>))
        .route("/health", get(health::<R>))
        .route("/echo", get(echo::<R>))
        .route("/fs_read", post(fs_read::<R>))
        .route("/fs_write", post(fs_write::<R>))
        .route("/bash_cmd", post(bash_cmd::<R>))
        .route("/git", post(git_cmd::<R>))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Serves the gateway on `addr` until `shutdown` resolves.
pub async fn serve<R, F>(gateway: Arc<Gateway<R>>, addr: SocketAddr, shutdown: F) -> Result<()>
where
    R: ProcessRunner + 'static,
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        addr = %local_addr,
        root = ?gateway.root().path(),
        "sandbox gateway listening"
    );

    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("sandbox gateway stopped");
    Ok(())
}

async fn ping<R: ProcessRunner>(State(gateway): State<Arc<Gateway<R>>>) -> Json<Pong> {
    Json(gateway.ping())
}

async fn health<R: ProcessRunner>(State(gateway): State<Arc<Gateway<R>>>) -> Json<Health> {
    Json(gateway.health())
}

async fn echo<R: ProcessRunner>(
    State(gateway): State<Arc<Gateway<R>>>,
    Query(params): Query<EchoParams>,
) -> Json<EchoResponse> {
    Json(EchoResponse {
        echo: gateway.echo(params.msg),
    })
}

async fn fs_read<R: ProcessRunner>(
    State(gateway): State<Arc<Gateway<R>>>,
    Query(params): Query<ReadParams>,
) -> ApiResult<ReadResponse> {
    let content = gateway.read_file(&params.rel_path).await?;
    Ok(Json(ReadResponse { content }))
}

async fn fs_write<R: ProcessRunner>(
    State(gateway): State<Arc<Gateway<R>>>,
    Query(params): Query<WriteParams>,
) -> ApiResult<WriteResponse> {
    let bytes = gateway
        .write_file(&params.rel_path, &params.content)
        .await?;
    Ok(Json(WriteResponse {
        status: "written".to_string(),
        bytes,
    }))
}

async fn bash_cmd<R: ProcessRunner>(
    State(gateway): State<Arc<Gateway<R>>>,
    Query(params): Query<ShellParams>,
) -> ApiResult<ExecutionResult> {
    Ok(Json(gateway.run_shell(&params.cmd).await?))
}

async fn git_cmd<R: ProcessRunner>(
    State(gateway): State<Arc<Gateway<R>>>,
    Query(params): Query<VcsParams>,
) -> ApiResult<ExecutionResult> {
    Ok(Json(
        gateway.run_vcs(&params.rel_repo, &params.sub_cmd).await?,
    ))
}
