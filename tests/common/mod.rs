#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use blog_service::bootstrap::{
    AdminConnect, AdminSession, DatabaseGuard, DbError, Execute, GuardPolicy, InitCoordinator,
    ScriptRunner, ScriptSource,
};
use blog_service::config::Config;
use blog_service::routes::create_router;
use blog_service::AppState;
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const TEST_DATABASE: &str = "educablog_test";

pub fn undefined_table(table: &str) -> DbError {
    DbError::with_code("42P01", format!("relation \"{table}\" does not exist"))
}

// ─── FakeExecutor ────────────────────────────────────────────────────────────

/// Records executed statements; fails statements containing a configured needle.
#[derive(Default)]
pub struct FakeExecutor {
    executed: Mutex<Vec<String>>,
    failures: Mutex<Vec<(String, DbError)>>,
    delay: Option<Duration>,
}

impl FakeExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn fail_when_contains(&self, needle: &str, error: DbError) {
        self.failures
            .lock()
            .unwrap()
            .push((needle.to_string(), error));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_count(&self) -> usize {
        self.executed.lock().unwrap().len()
    }
}

#[async_trait]
impl Execute for FakeExecutor {
    async fn execute(&self, statement: &str) -> Result<u64, DbError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| statement.contains(needle.as_str()))
            .map(|(_, e)| e.clone());
        if let Some(e) = failure {
            return Err(e);
        }
        self.executed.lock().unwrap().push(statement.to_string());
        Ok(0)
    }
}

// ─── FakeAdmin ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct AdminInner {
    databases: Mutex<HashSet<String>>,
    connect_error: Mutex<Option<DbError>>,
    exists_error: Mutex<Option<DbError>>,
    create_error: Mutex<Option<DbError>>,
    delay: Mutex<Option<Duration>>,
    connects: AtomicUsize,
    checks: AtomicUsize,
    creates: AtomicUsize,
    closes: AtomicUsize,
}

/// In-memory stand-in for the admin database catalog.
#[derive(Clone, Default)]
pub struct FakeAdmin {
    inner: Arc<AdminInner>,
}

impl FakeAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(name: &str) -> Self {
        let admin = Self::new();
        admin.inner.databases.lock().unwrap().insert(name.to_string());
        admin
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.inner.delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_connect(&self, error: DbError) {
        *self.inner.connect_error.lock().unwrap() = Some(error);
    }

    pub fn fail_exists(&self, error: DbError) {
        *self.inner.exists_error.lock().unwrap() = Some(error);
    }

    pub fn fail_create(&self, error: DbError) {
        *self.inner.create_error.lock().unwrap() = Some(error);
    }

    pub fn clear_failures(&self) {
        self.inner.connect_error.lock().unwrap().take();
        self.inner.exists_error.lock().unwrap().take();
        self.inner.create_error.lock().unwrap().take();
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.inner.databases.lock().unwrap().contains(name)
    }

    pub fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub fn checks(&self) -> usize {
        self.inner.checks.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.inner.creates.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdminConnect for FakeAdmin {
    async fn connect(&self) -> Result<Box<dyn AdminSession>, DbError> {
        let delay = *self.inner.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.inner.connect_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(Box::new(FakeSession {
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct FakeSession {
    inner: Arc<AdminInner>,
}

#[async_trait]
impl AdminSession for FakeSession {
    async fn database_exists(&mut self, name: &str) -> Result<bool, DbError> {
        self.inner.checks.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.inner.exists_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.inner.databases.lock().unwrap().contains(name))
    }

    async fn create_database(&mut self, name: &str) -> Result<(), DbError> {
        self.inner.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.inner.create_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.inner
            .databases
            .lock()
            .unwrap()
            .insert(name.to_string());
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ─── Wiring helpers ──────────────────────────────────────────────────────────

pub fn guard(admin: &FakeAdmin) -> DatabaseGuard {
    DatabaseGuard::new(Arc::new(admin.clone()), GuardPolicy::default())
}

pub fn runner(script: &str, admin: &FakeAdmin, executor: &Arc<FakeExecutor>) -> ScriptRunner {
    ScriptRunner::new(
        ScriptSource::Inline(script.to_string()),
        TEST_DATABASE,
        guard(admin),
        executor.clone(),
    )
}

pub fn coordinator(script: &str, admin: &FakeAdmin, executor: &Arc<FakeExecutor>) -> InitCoordinator {
    InitCoordinator::new(runner(script, admin, executor))
}

pub fn test_config() -> Config {
    let mut database = tokio_postgres::Config::new();
    database
        .host("localhost")
        .port(5432)
        .user("postgres")
        .dbname(TEST_DATABASE);

    Config {
        database,
        admin_database: "postgres".to_string(),
        schema_script_path: None,
        retry_on_safe_methods: true,
        tolerate_existing_database: true,
        bootstrap_on_startup: false,
        db_pool_max_size: 1,
        db_connect_timeout: Duration::from_secs(2),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
    }
}

/// Points the target pool at a port nothing listens on.
pub fn unreachable_config() -> Config {
    let mut config = test_config();
    config.database.port(1);
    config
}

/// Server for tests that need real PostgreSQL, from `TEST_DATABASE_URL`.
/// Those tests return early when it is unset.
pub fn live_database() -> Option<tokio_postgres::Config> {
    std::env::var("TEST_DATABASE_URL").ok()?.parse().ok()
}

// ─── TestResponse ────────────────────────────────────────────────────────────

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes).to_string()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body_bytes).unwrap_or_else(|e| {
            panic!(
                "Failed to deserialize response as {}: {e}\nBody: {}",
                std::any::type_name::<T>(),
                self.text()
            )
        })
    }

    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(
            self.status, expected,
            "Expected status {expected}, got {}. Body: {}",
            self.status,
            self.text()
        );
    }
}

// ─── TestApp ─────────────────────────────────────────────────────────────────

pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub executor: Arc<FakeExecutor>,
    pub admin: FakeAdmin,
}

impl TestApp {
    /// Service router backed by fakes, target database absent.
    pub async fn new(script: &str) -> Self {
        Self::with_config(script, test_config(), create_router).await
    }

    /// Custom router over the same fake-backed state.
    pub async fn with_config(
        script: &str,
        config: Config,
        build: impl FnOnce(AppState) -> Router,
    ) -> Self {
        let admin = FakeAdmin::new();
        let executor = FakeExecutor::new();

        let state = AppState {
            db: blog_service::db::pool::connect(
                config.database.clone(),
                config.db_pool_max_size,
                config.db_connect_timeout,
            ),
            init: coordinator(script, &admin, &executor),
            config,
        };

        let router = build(state.clone());

        Self {
            router,
            state,
            executor,
            admin,
        }
    }

    pub async fn request(&self, req: Request<Body>) -> TestResponse {
        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("oneshot failed");

        let status = resp.status();
        let body_bytes = resp
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes()
            .to_vec();

        TestResponse { status, body_bytes }
    }

    pub async fn send(&self, method: &str, uri: &str) -> TestResponse {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.request(req).await
    }
}
