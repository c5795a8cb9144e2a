use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::core::config::ConfigError;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("llm gateway setup failed: {0}")]
    GatewaySetup(#[source] llm_gateway::GatewayError),

    #[error("host client setup failed: {0}")]
    HostSetup(#[source] host_client::HostError),

    #[error("session store failed to rehydrate")]
    StoreInit(#[source] session_store::StoreError),

    // --- IO / network / server ---
    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request / routing ---
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    /// Downstream fault surfaced through a synchronous endpoint (manual
    /// trigger needing a branch lookup). The webhook path never uses this.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Store fault inside a request handler.
    #[error("store error")]
    Store(#[from] session_store::StoreError),
}

impl From<automation::AutomationError> for AppError {
    fn from(e: automation::AutomationError) -> Self {
        match e {
            automation::AutomationError::Store(s) => AppError::Store(s),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl AppError {
    /// Process exit code mapping used by the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::GatewaySetup(_) | AppError::HostSetup(_) => 1,
            AppError::Bind(_) => 2,
            AppError::StoreInit(_) => 3,
            _ => 1,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            // startup-only; a handler never returns these
            AppError::Config(_)
            | AppError::GatewaySetup(_)
            | AppError::HostSetup(_)
            | AppError::StoreInit(_)
            | AppError::Bind(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,

            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::GatewaySetup(_) => "GATEWAY_SETUP_ERROR",
            AppError::HostSetup(_) => "HOST_SETUP_ERROR",
            AppError::StoreInit(_) => "STORE_INIT_ERROR",
            AppError::Bind(_) => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Upstream(_) => "UPSTREAM_ERROR",
            AppError::Store(_) => "STORE_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;
