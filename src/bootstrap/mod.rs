//! Self-provisioning of the target database and its schema.

pub mod classify;
pub mod coordinator;
pub mod guard;
pub mod meta;
pub mod retry;
pub mod runner;
pub mod tokenizer;

pub use classify::DbError;
pub use coordinator::{BootstrapOutcome, InitCoordinator, InitStatus};
pub use guard::{AdminConnect, AdminSession, DatabaseGuard, DatabaseOutcome, GuardPolicy};
pub use retry::{with_db_init, with_init_retry, InitFailure, InitRetryError, RetryPolicy};
pub use runner::{BootstrapReport, Execute, ScriptRunner, ScriptSource};
pub use tokenizer::{tokenize, Statement};
