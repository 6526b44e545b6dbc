use crate::config::RetrySettings;
use crate::db::DbPool;
use crate::errors::ServiceError;
use futures::future::BoxFuture;
use sea_orm::{DatabaseTransaction, TransactionError, TransactionTrait};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

/// Bounded retry policy for conflicting units of work.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, first try included
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Factor to multiply delay by after each attempt
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_factor: settings.backoff_factor,
        }
    }
}

/// Runs every multi-step engine operation as one unit of work: a single
/// storage transaction that commits in full or rolls back in full.
///
/// Two units of work touching the same bucket key are serialized by the
/// storage layer; the loser aborts with a conflict and is re-run here, up
/// to the configured bound, before the error surfaces to the caller.
#[derive(Clone)]
pub struct TxnRunner {
    db: Arc<DbPool>,
    retry: RetryConfig,
}

impl TxnRunner {
    pub fn new(db: Arc<DbPool>, retry: RetryConfig) -> Self {
        Self { db, retry }
    }

    pub fn db(&self) -> &DbPool {
        self.db.as_ref()
    }

    /// Executes `op` inside a transaction, retrying conflicted attempts
    /// with exponential backoff. `op` must be safe to re-run from scratch:
    /// it is handed a fresh transaction on every attempt.
    pub async fn run<T, F>(&self, op: F) -> Result<T, ServiceError>
    where
        T: Send,
        F: for<'c> Fn(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>>
            + Send
            + Sync,
    {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1u32;

        loop {
            let result = self
                .db
                .transaction::<_, T, ServiceError>(|txn| op(txn))
                .await
                .map_err(|e| match e {
                    TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                    TransactionError::Transaction(service_err) => service_err,
                });

            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if let ServiceError::Integrity(ref msg) = err {
                        error!(attempt, %msg, "Integrity violation aborted unit of work");
                        return Err(err);
                    }
                    if err.is_retryable() && attempt < self.retry.max_attempts {
                        warn!(
                            attempt,
                            max_attempts = self.retry.max_attempts,
                            error = %err,
                            "Unit of work conflicted, retrying"
                        );
                        sleep(delay).await;
                        delay = Duration::from_secs_f64(
                            (delay.as_secs_f64() * self.retry.backoff_factor)
                                .min(self.retry.max_delay.as_secs_f64()),
                        );
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }
}
