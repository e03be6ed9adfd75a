use std::time::Duration;

use async_trait::async_trait;
use bb8::{ErrorSink, Pool, PooledConnection, RunError};
use bb8_postgres::PostgresConnectionManager;
use tokio::sync::broadcast;
use tokio_postgres::NoTls;

use crate::bootstrap::classify::DbError;
use crate::bootstrap::runner::Execute;

type Manager = PostgresConnectionManager<NoTls>;

pub type PgConnection<'a> = PooledConnection<'a, Manager>;

/// Target-database pool. bb8 only reports connect failures to its error sink,
/// so the sink rebroadcasts them to checkouts waiting in `get`.
#[derive(Clone)]
pub struct Db {
    pool: Pool<Manager>,
    failures: broadcast::Sender<DbError>,
}

#[derive(Debug, Clone)]
struct BroadcastSink(broadcast::Sender<DbError>);

impl ErrorSink<tokio_postgres::Error> for BroadcastSink {
    fn sink(&self, error: tokio_postgres::Error) {
        let error = DbError::from(error);
        tracing::debug!(error = %error, "Pool connection attempt failed");
        // No receivers just means no request is waiting.
        let _ = self.0.send(error);
    }

    fn boxed_clone(&self) -> Box<dyn ErrorSink<tokio_postgres::Error>> {
        Box::new(self.clone())
    }
}

/// Builds the pool without opening connections, so a database that does not
/// exist yet does not prevent startup.
pub fn connect(config: tokio_postgres::Config, max_size: u32, connection_timeout: Duration) -> Db {
    let (failures, _) = broadcast::channel(16);
    let mgr = PostgresConnectionManager::new(config, NoTls);
    let pool = Pool::builder()
        .max_size(max_size)
        .connection_timeout(connection_timeout)
        .retry_connection(false)
        .error_sink(Box::new(BroadcastSink(failures.clone())))
        .build_unchecked(mgr);

    Db { pool, failures }
}

impl Db {
    pub async fn get(&self) -> Result<PgConnection<'_>, DbError> {
        // Subscribe first so a failure raised by this checkout is not missed.
        let mut failures = self.failures.subscribe();

        tokio::select! {
            biased;
            checkout = self.pool.get() => match checkout {
                Ok(conn) => Ok(conn),
                Err(RunError::User(e)) => Err(e.into()),
                Err(RunError::TimedOut) => Err(self.diagnose_timeout().await),
            },
            Ok(error) = failures.recv() => Err(error),
        }
    }

    async fn diagnose_timeout(&self) -> DbError {
        match self.pool.dedicated_connection().await {
            Err(e) => e.into(),
            Ok(_) => DbError::plain("timed out waiting for a pooled connection"),
        }
    }
}

/// Executes bootstrap statements on pooled connections to the target database.
#[derive(Clone)]
pub struct PoolExecutor {
    db: Db,
}

impl PoolExecutor {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Execute for PoolExecutor {
    async fn execute(&self, statement: &str) -> Result<u64, DbError> {
        let conn = self.db.get().await?;
        Ok(conn.execute(statement, &[]).await?)
    }
}
