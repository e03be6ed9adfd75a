pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;

use std::sync::Arc;

use bootstrap::{DatabaseGuard, InitCoordinator, ScriptRunner};
use config::Config;
use db::admin::PgAdminConnector;
use db::pool::{Db, PoolExecutor};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub init: InitCoordinator,
    pub config: Config,
}

impl AppState {
    /// Wires the pool, the admin connector and the coordinator from `config`.
    pub fn from_config(config: Config) -> Self {
        let db = db::pool::connect(
            config.database.clone(),
            config.db_pool_max_size,
            config.db_connect_timeout,
        );

        let guard = DatabaseGuard::new(
            Arc::new(PgAdminConnector::new(config.admin_pg_config())),
            config.guard_policy(),
        );
        let runner = ScriptRunner::new(
            config.script_source(),
            config.target_database(),
            guard,
            Arc::new(PoolExecutor::new(db.clone())),
        );

        Self {
            db,
            init: InitCoordinator::new(runner),
            config,
        }
    }
}
