use crate::db::DbPool;
use crate::entities::inventory_bucket::Condition;
use crate::entities::stock_adjustment::{ReasonCode, StockField};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Actor, BucketKey, LedgerSnapshot, LocationRef, ProductRef};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use sea_orm::DatabaseTransaction;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::balances::BalanceStore;
use super::ledger::{apply_recorded, AdjustmentContext};
use super::txn::{RetryConfig, TxnRunner};

lazy_static! {
    static ref STOCK_CORRECTIONS: IntCounter = IntCounter::new(
        "stock_corrections_total",
        "Total number of completed stock corrections"
    )
    .expect("metric can be created");
    static ref STOCK_CORRECTION_FAILURES: IntCounter = IntCounter::new(
        "stock_correction_failures_total",
        "Total number of failed stock corrections"
    )
    .expect("metric can be created");
}

/// Applies one signed delta to one field of one existing bucket.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdjustStockCommand {
    pub bucket_id: Uuid,

    pub field: StockField,

    /// Signed, nonzero. Negative deltas that would drive the field below
    /// zero are rejected.
    pub delta: i32,

    pub reason_code: ReasonCode,

    pub reason_note: Option<String>,

    pub actor: Actor,

    /// Reference data for the bucket's product, snapshotted into the row.
    pub product: ProductRef,

    /// Names for the bucket's location, for the snapshot.
    pub location: LocationRef,

    pub loan_number: Option<String>,
}

/// Credits stock into a bucket addressed by natural key, creating the
/// bucket on first stock-in. This is the return-processing entry point;
/// existing buckets take the `adjust` path.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceiveStockCommand {
    pub product: ProductRef,

    pub location: LocationRef,

    pub condition: Condition,

    pub field: StockField,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,

    pub reason_code: ReasonCode,

    pub reason_note: Option<String>,

    pub actor: Actor,

    pub loan_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustResult {
    pub bucket_id: Uuid,
    pub field: StockField,
    pub before: i32,
    pub after: i32,
    /// True when the adjustment emptied the bucket and it was removed.
    pub bucket_removed: bool,
}

struct AdjustOutcome {
    result: AdjustResult,
    product_id: Uuid,
    reason_code: ReasonCode,
    delta: i32,
}

/// Single-bucket corrections: manual stock fixes, loan-out/return-in
/// bookkeeping, mark-lost. One balance change, one ledger row, one unit of
/// work.
#[derive(Clone)]
pub struct CorrectionService {
    runner: TxnRunner,
    event_sender: Arc<EventSender>,
}

impl CorrectionService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, retry: RetryConfig) -> Self {
        Self {
            runner: TxnRunner::new(db, retry),
            event_sender,
        }
    }

    #[instrument(skip(self, cmd), fields(bucket_id = %cmd.bucket_id, delta = cmd.delta))]
    pub async fn adjust(&self, cmd: AdjustStockCommand) -> Result<AdjustResult, ServiceError> {
        cmd.validate().map_err(|e| {
            STOCK_CORRECTION_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::Validation(msg)
        })?;

        if cmd.delta == 0 {
            STOCK_CORRECTION_FAILURES.inc();
            return Err(ServiceError::Validation(
                "Adjustment delta must not be zero".to_string(),
            ));
        }

        let outcome = self
            .runner
            .run(|txn| {
                let cmd = cmd.clone();
                Box::pin(async move { adjust_in_txn(txn, &cmd).await })
            })
            .await
            .map_err(|e| {
                STOCK_CORRECTION_FAILURES.inc();
                e
            })?;

        // Committed at this point; a lost event is logged, not surfaced.
        if let Err(e) = self
            .event_sender
            .send(Event::StockAdjusted {
                bucket_id: outcome.result.bucket_id,
                product_id: outcome.product_id,
                field: outcome.result.field.as_str().to_string(),
                delta: outcome.delta,
                quantity_before: outcome.result.before,
                quantity_after: outcome.result.after,
                reason_code: outcome.reason_code.as_str().to_string(),
            })
            .await
        {
            warn!(error = %e, "Failed to publish adjustment event");
        }

        if outcome.result.bucket_removed {
            if let Err(e) = self
                .event_sender
                .send(Event::BucketRemoved {
                    bucket_id: outcome.result.bucket_id,
                    product_id: outcome.product_id,
                })
                .await
            {
                warn!(error = %e, "Failed to publish bucket-removed event");
            }
        }

        STOCK_CORRECTIONS.inc();
        info!(
            before = outcome.result.before,
            after = outcome.result.after,
            reason_code = outcome.reason_code.as_str(),
            "Stock adjusted"
        );
        Ok(outcome.result)
    }

    #[instrument(skip(self, cmd), fields(product_id = %cmd.product.id, quantity = cmd.quantity))]
    pub async fn receive(&self, cmd: ReceiveStockCommand) -> Result<AdjustResult, ServiceError> {
        cmd.validate().map_err(|e| {
            STOCK_CORRECTION_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::Validation(msg)
        })?;

        let outcome = self
            .runner
            .run(|txn| {
                let cmd = cmd.clone();
                Box::pin(async move { receive_in_txn(txn, &cmd).await })
            })
            .await
            .map_err(|e| {
                STOCK_CORRECTION_FAILURES.inc();
                e
            })?;

        if let Err(e) = self
            .event_sender
            .send(Event::StockReceived {
                bucket_id: outcome.result.bucket_id,
                product_id: outcome.product_id,
                field: outcome.result.field.as_str().to_string(),
                quantity: outcome.delta,
                reason_code: outcome.reason_code.as_str().to_string(),
            })
            .await
        {
            warn!(error = %e, "Failed to publish receipt event");
        }

        STOCK_CORRECTIONS.inc();
        info!(
            bucket_id = %outcome.result.bucket_id,
            after = outcome.result.after,
            "Stock received"
        );
        Ok(outcome.result)
    }
}

async fn adjust_in_txn(
    txn: &DatabaseTransaction,
    cmd: &AdjustStockCommand,
) -> Result<AdjustOutcome, ServiceError> {
    let bucket = BalanceStore::get(txn, cmd.bucket_id).await?;

    if cmd.product.id != bucket.product_id {
        return Err(ServiceError::Validation(format!(
            "product reference {} does not match bucket product {}",
            cmd.product.id, bucket.product_id
        )));
    }

    let key = BucketKey::from_bucket(&bucket)?;
    let product_id = bucket.product_id;
    let bucket_id = bucket.id;

    let ctx = AdjustmentContext {
        reason_code: cmd.reason_code,
        reason_note: cmd.reason_note.clone(),
        actor: cmd.actor.clone(),
        correlation_id: Uuid::new_v4(),
        correlation: json!({
            "bucket_id": bucket_id,
            "product_id": product_id,
            "loan_number": cmd.loan_number,
        }),
        snapshot: LedgerSnapshot::new(&cmd.product, &cmd.location, key.condition),
    };

    let applied = apply_recorded(txn, bucket, cmd.field, cmd.delta, &ctx).await?;

    let bucket_removed = if cmd.delta < 0 && applied.bucket.is_empty() {
        BalanceStore::delete_if_empty(txn, bucket_id).await?
    } else {
        false
    };

    Ok(AdjustOutcome {
        result: AdjustResult {
            bucket_id,
            field: cmd.field,
            before: applied.before,
            after: applied.after,
            bucket_removed,
        },
        product_id,
        reason_code: cmd.reason_code,
        delta: cmd.delta,
    })
}

async fn receive_in_txn(
    txn: &DatabaseTransaction,
    cmd: &ReceiveStockCommand,
) -> Result<AdjustOutcome, ServiceError> {
    let key = BucketKey {
        product_id: cmd.product.id,
        warehouse_id: cmd.location.warehouse_id,
        shelf_id: cmd.location.shelf_id,
        condition: cmd.condition,
    };

    let bucket = BalanceStore::get_or_create(txn, &key).await?;
    let bucket_id = bucket.id;

    let ctx = AdjustmentContext {
        reason_code: cmd.reason_code,
        reason_note: cmd.reason_note.clone(),
        actor: cmd.actor.clone(),
        correlation_id: Uuid::new_v4(),
        correlation: json!({
            "bucket_id": bucket_id,
            "product_id": cmd.product.id,
            "loan_number": cmd.loan_number,
        }),
        snapshot: LedgerSnapshot::new(&cmd.product, &cmd.location, cmd.condition),
    };

    let applied = apply_recorded(txn, bucket, cmd.field, cmd.quantity, &ctx).await?;

    Ok(AdjustOutcome {
        result: AdjustResult {
            bucket_id,
            field: cmd.field,
            before: applied.before,
            after: applied.after,
            bucket_removed: false,
        },
        product_id: cmd.product.id,
        reason_code: cmd.reason_code,
        delta: cmd.quantity,
    })
}
