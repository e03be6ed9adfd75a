use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub database: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CountsResponse {
    pub users: i64,
    pub posts: i64,
}

/// Tables in the `public` schema of the target database.
pub async fn list_tables(State(state): State<AppState>) -> Result<Json<TablesResponse>, AppError> {
    let conn = state.db.get().await?;
    let rows = conn
        .query(
            "SELECT tablename::text FROM pg_catalog.pg_tables \
             WHERE schemaname = 'public' ORDER BY tablename",
            &[],
        )
        .await?;

    Ok(Json(TablesResponse {
        database: state.config.target_database().to_string(),
        tables: rows.iter().map(|row| row.get(0)).collect(),
    }))
}

/// Row counts of the bootstrap-managed tables. Fails with `undefined_table`
/// until the schema exists.
pub async fn counts(State(state): State<AppState>) -> Result<Json<CountsResponse>, AppError> {
    let conn = state.db.get().await?;
    let row = conn
        .query_one(
            "SELECT (SELECT count(*) FROM users), (SELECT count(*) FROM posts)",
            &[],
        )
        .await?;

    Ok(Json(CountsResponse {
        users: row.get(0),
        posts: row.get(1),
    }))
}
