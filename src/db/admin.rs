use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};

use crate::bootstrap::classify::DbError;
use crate::bootstrap::guard::{quote_identifier, AdminConnect, AdminSession};

/// Opens short-lived connections to the admin database (usually `postgres`).
#[derive(Clone)]
pub struct PgAdminConnector {
    config: tokio_postgres::Config,
}

impl PgAdminConnector {
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AdminConnect for PgAdminConnector {
    async fn connect(&self) -> Result<Box<dyn AdminSession>, DbError> {
        let (client, connection) = self.config.connect(NoTls).await?;
        tracing::debug!("Admin connection established");

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Admin connection error: {e}");
            }
        });

        Ok(Box::new(PgAdminSession { client, driver }))
    }
}

struct PgAdminSession {
    client: Client,
    driver: JoinHandle<()>,
}

#[async_trait]
impl AdminSession for PgAdminSession {
    async fn database_exists(&mut self, name: &str) -> Result<bool, DbError> {
        let row = self
            .client
            .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&name])
            .await?;
        Ok(row.is_some())
    }

    async fn create_database(&mut self, name: &str) -> Result<(), DbError> {
        // CREATE DATABASE takes no bind parameters.
        self.client
            .batch_execute(&format!("CREATE DATABASE {}", quote_identifier(name)))
            .await?;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        let PgAdminSession { client, driver } = *self;
        // Dropping the client ends the connection task.
        drop(client);
        if let Err(e) = driver.await {
            tracing::warn!("Admin connection task did not shut down cleanly: {e}");
        }
        tracing::debug!("Admin connection closed");
    }
}
