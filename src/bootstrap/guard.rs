use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::classify::{DbError, DUPLICATE_DATABASE};
use crate::error::BootstrapError;

#[async_trait]
pub trait AdminConnect: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn AdminSession>, DbError>;
}

/// One administrative connection. Callers must `close` it when done.
#[async_trait]
pub trait AdminSession: Send {
    async fn database_exists(&mut self, name: &str) -> Result<bool, DbError>;

    async fn create_database(&mut self, name: &str) -> Result<(), DbError>;

    async fn close(self: Box<Self>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseOutcome {
    Created,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy)]
pub struct GuardPolicy {
    pub tolerate_existing: bool,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            tolerate_existing: true,
        }
    }
}

#[derive(Clone)]
pub struct DatabaseGuard {
    connector: Arc<dyn AdminConnect>,
    policy: GuardPolicy,
}

impl DatabaseGuard {
    pub fn new(connector: Arc<dyn AdminConnect>, policy: GuardPolicy) -> Self {
        Self { connector, policy }
    }

    /// Creates `name` when the catalog does not list it. Idempotent.
    pub async fn ensure_exists(&self, name: &str) -> Result<DatabaseOutcome, BootstrapError> {
        let mut session =
            self.connector
                .connect()
                .await
                .map_err(|source| BootstrapError::AdminConnect {
                    database: name.to_string(),
                    source,
                })?;

        let result = self.check_and_create(session.as_mut(), name).await;
        session.close().await;
        result
    }

    async fn check_and_create(
        &self,
        session: &mut dyn AdminSession,
        name: &str,
    ) -> Result<DatabaseOutcome, BootstrapError> {
        let exists = session
            .database_exists(name)
            .await
            .map_err(|source| BootstrapError::ExistenceCheck {
                database: name.to_string(),
                source,
            })?;

        if exists {
            tracing::info!(database = name, "Database already exists");
            return Ok(DatabaseOutcome::AlreadyPresent);
        }

        tracing::info!(database = name, "Database not found, creating");
        match session.create_database(name).await {
            Ok(()) => {
                tracing::info!(database = name, "Database created");
                Ok(DatabaseOutcome::Created)
            }
            Err(e) if self.policy.tolerate_existing && e.has_code(DUPLICATE_DATABASE) => {
                tracing::warn!(database = name, "Database was created concurrently");
                Ok(DatabaseOutcome::AlreadyPresent)
            }
            Err(source) => Err(BootstrapError::Creation {
                database: name.to_string(),
                source,
            }),
        }
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
