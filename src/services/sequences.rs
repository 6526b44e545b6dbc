use crate::db::DbPool;
use crate::entities::sequence_counter::{self, Entity as SequenceCounter};
use crate::errors::ServiceError;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::sync::Arc;
use tracing::instrument;

use super::txn::{RetryConfig, TxnRunner};

/// Atomic increment-and-read counters for the human-readable document
/// numbers callers stamp on loans and vouchers. Each prefix is its own
/// counter row; the increment runs in a transaction and a racing increment
/// is retried, so numbers are never lost or duplicated.
#[derive(Clone)]
pub struct SequenceService {
    runner: TxnRunner,
}

impl SequenceService {
    pub fn new(db: Arc<DbPool>, retry: RetryConfig) -> Self {
        Self {
            runner: TxnRunner::new(db, retry),
        }
    }

    /// Returns the next value for `prefix`, starting at 1.
    #[instrument(skip(self))]
    pub async fn next(&self, prefix: &str) -> Result<i64, ServiceError> {
        if prefix.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Sequence prefix must not be empty".to_string(),
            ));
        }

        let prefix = prefix.to_string();
        self.runner
            .run(|txn| {
                let prefix = prefix.clone();
                Box::pin(async move {
                    let existing = SequenceCounter::find_by_id(prefix.clone())
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    match existing {
                        Some(counter) => {
                            let next = counter.current_value + 1;
                            let mut active: sequence_counter::ActiveModel = counter.into();
                            active.current_value = Set(next);
                            active.update(txn).await.map_err(ServiceError::db_error)?;
                            Ok(next)
                        }
                        None => {
                            let counter = sequence_counter::ActiveModel {
                                prefix: Set(prefix),
                                current_value: Set(1),
                            };
                            // A racing first increment trips the primary key
                            // and is retried against the created row.
                            counter.insert(txn).await.map_err(ServiceError::db_error)?;
                            Ok(1)
                        }
                    }
                })
            })
            .await
    }

    /// Renders a document number in the caller-facing `PREFIX-000123` form.
    pub fn format_number(prefix: &str, value: i64) -> String {
        format!("{}-{:06}", prefix, value)
    }
}
