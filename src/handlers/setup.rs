use axum::{extract::State, Json};
use serde::Serialize;

use crate::bootstrap::DatabaseOutcome;
use crate::error::AppError;
use crate::AppState;

// --- Response types ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub schema_ready: bool,
    pub bootstrap_in_flight: bool,
}

#[derive(Debug, Serialize)]
pub struct SetupResponse {
    pub database: String,
    pub database_created: bool,
    pub statements: usize,
    pub script_sha256: String,
}

// --- Handlers ---

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.init.status();
    Json(HealthResponse {
        status: "ok",
        schema_ready: status.ready,
        bootstrap_in_flight: status.in_flight,
    })
}

/// Runs the bootstrap on demand. Joins a run already in flight.
pub async fn setup_database(
    State(state): State<AppState>,
) -> Result<Json<SetupResponse>, AppError> {
    let report = state.init.ensure_schema().await?;

    Ok(Json(SetupResponse {
        database: report.database.clone(),
        database_created: report.database_outcome == DatabaseOutcome::Created,
        statements: report.statement_count(),
        script_sha256: report.script_sha256,
    }))
}
