use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

use super::runner::{BootstrapReport, ScriptRunner};
use crate::error::BootstrapError;

pub type BootstrapOutcome = Result<BootstrapReport, BootstrapError>;

type Pending = watch::Receiver<Option<BootstrapOutcome>>;

/// Single-flight wrapper around [`ScriptRunner`].
#[derive(Clone)]
pub struct InitCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    runner: ScriptRunner,
    slot: Mutex<Option<Pending>>,
    ready: AtomicBool,
    attempts: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InitStatus {
    pub in_flight: bool,
    pub ready: bool,
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, Option<Pending>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the slot to idle when the bootstrap task ends, even by panic.
struct ClearSlot(Arc<Inner>);

impl Drop for ClearSlot {
    fn drop(&mut self) {
        self.0.slot().take();
    }
}

impl InitCoordinator {
    pub fn new(runner: ScriptRunner) -> Self {
        Self {
            inner: Arc::new(Inner {
                runner,
                slot: Mutex::new(None),
                ready: AtomicBool::new(false),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    pub fn status(&self) -> InitStatus {
        InitStatus {
            in_flight: self.inner.slot().is_some(),
            ready: self.inner.ready.load(Ordering::Acquire),
        }
    }

    pub fn attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::Acquire)
    }

    /// Ensures the target database and schema exist, joining any run in flight.
    pub async fn ensure_schema(&self) -> BootstrapOutcome {
        let mut pending = self.join_or_start();

        let settled = pending
            .wait_for(Option::is_some)
            .await
            .map(|outcome| (*outcome).clone());

        match settled {
            Ok(Some(outcome)) => outcome,
            // The sender dropped without publishing: the task panicked or the
            // runtime is shutting down.
            Ok(None) | Err(_) => Err(BootstrapError::Aborted),
        }
    }

    fn join_or_start(&self) -> Pending {
        let mut slot = self.inner.slot();
        if let Some(pending) = slot.as_ref() {
            tracing::debug!("Joining in-flight bootstrap");
            return pending.clone();
        }

        let (tx, rx) = watch::channel(None);
        *slot = Some(rx.clone());
        drop(slot);

        let attempt = self.inner.attempts.fetch_add(1, Ordering::AcqRel) + 1;
        let attempt_id = uuid::Uuid::new_v4();
        let inner = Arc::clone(&self.inner);

        // Spawned so that a cancelled caller cannot strand the other waiters.
        tokio::spawn(async move {
            let clear = ClearSlot(Arc::clone(&inner));
            tracing::info!(%attempt_id, attempt, database = inner.runner.database(), "Starting database bootstrap");

            let outcome = inner.runner.run().await;
            match &outcome {
                Ok(report) => {
                    inner.ready.store(true, Ordering::Release);
                    tracing::info!(
                        %attempt_id,
                        statements = report.statement_count(),
                        "Database bootstrap complete"
                    );
                }
                Err(e) => tracing::error!(%attempt_id, error = %e, "Database bootstrap failed"),
            }

            // Idle before publishing, so a waiter that immediately calls again
            // starts a new attempt instead of re-reading this one.
            drop(clear);
            let _ = tx.send(Some(outcome));
        });

        rx
    }
}
