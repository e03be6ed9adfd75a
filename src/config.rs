use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::bootstrap::guard::GuardPolicy;
use crate::bootstrap::retry::RetryPolicy;
use crate::bootstrap::runner::ScriptSource;

pub const DEFAULT_DATABASE: &str = "educablog";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid DATABASE_URL: {0}")]
    InvalidDatabaseUrl(#[from] tokio_postgres::Error),
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Connection settings for the target database. `dbname` is always set.
    pub database: tokio_postgres::Config,
    pub admin_database: String,
    pub schema_script_path: Option<PathBuf>,
    pub retry_on_safe_methods: bool,
    pub tolerate_existing_database: bool,
    pub bootstrap_on_startup: bool,
    pub db_pool_max_size: u32,
    /// How long a request waits for a pooled connection.
    pub db_connect_timeout: Duration,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database: database_from_env()?,
            admin_database: env::var("ADMIN_DATABASE").unwrap_or_else(|_| "postgres".to_string()),
            schema_script_path: env::var("SCHEMA_SCRIPT_PATH").ok().map(PathBuf::from),
            retry_on_safe_methods: env_flag("RETRY_ON_SAFE_METHODS", true),
            tolerate_existing_database: env_flag("TOLERATE_EXISTING_DATABASE", true),
            bootstrap_on_startup: env_flag("BOOTSTRAP_ON_STARTUP", true),
            db_pool_max_size: env::var("DB_POOL_MAX_SIZE")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            db_connect_timeout: Duration::from_secs(
                env::var("DB_CONNECT_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            ),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        })
    }

    pub fn target_database(&self) -> &str {
        self.database.get_dbname().unwrap_or(DEFAULT_DATABASE)
    }

    /// Same server and credentials as the target, pointed at the admin database.
    pub fn admin_pg_config(&self) -> tokio_postgres::Config {
        let mut config = self.database.clone();
        config.dbname(&self.admin_database);
        config
    }

    pub fn script_source(&self) -> ScriptSource {
        match &self.schema_script_path {
            Some(path) => ScriptSource::File(path.clone()),
            None => ScriptSource::Embedded,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retry_on_safe_methods: self.retry_on_safe_methods,
        }
    }

    pub fn guard_policy(&self) -> GuardPolicy {
        GuardPolicy {
            tolerate_existing: self.tolerate_existing_database,
        }
    }
}

/// `DATABASE_URL` wins; otherwise libpq `PG*` variables, then `POSTGRES_*`.
fn database_from_env() -> Result<tokio_postgres::Config, ConfigError> {
    let mut config = match env::var("DATABASE_URL") {
        Ok(url) => url.parse::<tokio_postgres::Config>()?,
        Err(_) => {
            let mut config = tokio_postgres::Config::new();
            config
                .host(&env_any(&["PGHOST", "POSTGRES_HOST"]).unwrap_or_else(|| "localhost".to_string()))
                .port(
                    env_any(&["PGPORT", "POSTGRES_PORT"])
                        .and_then(|p| p.parse().ok())
                        .unwrap_or(5432),
                )
                .user(&env_any(&["PGUSER", "POSTGRES_USER"]).unwrap_or_else(|| "postgres".to_string()))
                .password(env_any(&["PGPASSWORD", "POSTGRES_PASSWORD"]).unwrap_or_default());
            config
        }
    };

    if config.get_dbname().is_none() {
        let name = env_any(&["PGDATABASE", "POSTGRES_DB"]).unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        config.dbname(&name);
    }
    Ok(config)
}

/// First variable in `keys` that is set and non-empty.
fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.is_empty())
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
