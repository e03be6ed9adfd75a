use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::bootstrap::classify::DbError;

/// Why a bootstrap attempt failed. Cloned to every caller waiting on the attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to read bootstrap script {path}: {message}")]
    Script { path: String, message: String },

    #[error("connecting to the admin database to provision \"{database}\" failed: {source}")]
    AdminConnect { database: String, source: DbError },

    #[error("existence check for database \"{database}\" failed: {source}")]
    ExistenceCheck { database: String, source: DbError },

    #[error("creation of database \"{database}\" failed: {source}")]
    Creation { database: String, source: DbError },

    #[error("statement {ordinal} of {total} failed: {source}")]
    Statement {
        ordinal: usize,
        total: usize,
        source: DbError,
    },

    #[error("bootstrap ended without reporting an outcome")]
    Aborted,
}

impl BootstrapError {
    /// 1-based index of the failing statement, when a statement failed.
    pub fn statement_ordinal(&self) -> Option<usize> {
        match self {
            BootstrapError::Statement { ordinal, .. } => Some(*ordinal),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Database bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("Database initialized; retry your request")]
    Initializing,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                let body = json!({
                    "error": "internal_error",
                    "message": "Internal server error",
                });
                let mut response = (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response();
                // Read by the bootstrap middleware to classify the failure.
                response.extensions_mut().insert(e.clone());
                return response;
            }
            AppError::Bootstrap(e) => {
                tracing::error!("Bootstrap error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "bootstrap_failed",
                        "message": self.to_string(),
                        "statement": e.statement_ordinal(),
                    }),
                )
            }
            AppError::Initializing => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error": "database_initialized",
                    "message": self.to_string(),
                }),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "internal_error",
                    "message": "Internal server error",
                }),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Database(e.into())
    }
}
