use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::classify::DbError;
use super::guard::{DatabaseGuard, DatabaseOutcome};
use super::meta::{strip_bom, strip_meta_commands};
use super::tokenizer::tokenize;
use crate::error::BootstrapError;

pub const EMBEDDED_SCRIPT: &str = include_str!("../../sql/educablog.sql");

/// Runs one statement against the target database.
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<u64, DbError>;
}

/// Where the bootstrap script comes from. Read fresh on every attempt.
#[derive(Debug, Clone)]
pub enum ScriptSource {
    Embedded,
    File(PathBuf),
    Inline(String),
}

impl ScriptSource {
    pub async fn load(&self) -> Result<String, BootstrapError> {
        match self {
            ScriptSource::Embedded => Ok(EMBEDDED_SCRIPT.to_string()),
            ScriptSource::Inline(text) => Ok(text.clone()),
            ScriptSource::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| BootstrapError::Script {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutedStatement {
    pub ordinal: usize,
    pub rows_affected: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub database: String,
    pub database_outcome: DatabaseOutcome,
    pub statements: Vec<ExecutedStatement>,
    pub script_sha256: String,
    pub completed_at: DateTime<Utc>,
}

impl BootstrapReport {
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

/// Guard, strip, tokenize, execute. Fails fast on the first bad statement.
#[derive(Clone)]
pub struct ScriptRunner {
    source: ScriptSource,
    database: String,
    guard: DatabaseGuard,
    executor: Arc<dyn Execute>,
}

impl ScriptRunner {
    pub fn new(
        source: ScriptSource,
        database: impl Into<String>,
        guard: DatabaseGuard,
        executor: Arc<dyn Execute>,
    ) -> Self {
        Self {
            source,
            database: database.into(),
            guard,
            executor,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub async fn run(&self) -> Result<BootstrapReport, BootstrapError> {
        let database_outcome = self.guard.ensure_exists(&self.database).await?;

        let raw = self.source.load().await?;
        let script_sha256 = hex::encode(Sha256::digest(raw.as_bytes()));
        tracing::debug!(database = %self.database, sha256 = %script_sha256, "Loaded bootstrap script");

        let statements = run_script(&raw, self.executor.as_ref()).await?;

        Ok(BootstrapReport {
            database: self.database.clone(),
            database_outcome,
            statements,
            script_sha256,
            completed_at: Utc::now(),
        })
    }
}

/// Executes a raw script statement by statement, strictly in source order.
pub async fn run_script(
    raw: &str,
    executor: &dyn Execute,
) -> Result<Vec<ExecutedStatement>, BootstrapError> {
    let cleaned = strip_meta_commands(strip_bom(raw));
    let statements = tokenize(&cleaned);
    let total = statements.len();
    tracing::info!(total, "Executing bootstrap statements");

    let mut executed = Vec::with_capacity(total);
    for statement in &statements {
        match executor.execute(statement.as_str()).await {
            Ok(rows_affected) => {
                tracing::debug!(ordinal = statement.ordinal, total, "Statement OK");
                executed.push(ExecutedStatement {
                    ordinal: statement.ordinal,
                    rows_affected,
                });
            }
            Err(source) => {
                tracing::error!(ordinal = statement.ordinal, total, error = %source, "Statement failed");
                return Err(BootstrapError::Statement {
                    ordinal: statement.ordinal,
                    total,
                    source,
                });
            }
        }
    }

    Ok(executed)
}
