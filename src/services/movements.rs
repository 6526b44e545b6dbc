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
    static ref STOCK_MOVEMENTS: IntCounter = IntCounter::new(
        "stock_movements_total",
        "Total number of completed stock movements"
    )
    .expect("metric can be created");
    static ref STOCK_MOVEMENT_FAILURES: IntCounter = IntCounter::new(
        "stock_movement_failures_total",
        "Total number of failed stock movements"
    )
    .expect("metric can be created");
}

/// Moves quantity to a different physical location; condition unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferStockCommand {
    pub source_bucket_id: Uuid,

    pub destination: LocationRef,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,

    /// Reference data for the moved product, supplied by the caller's
    /// catalog lookup and snapshotted into both ledger rows.
    pub product: ProductRef,

    /// Names for the source location, for the debit row's snapshot.
    pub source_location: LocationRef,

    pub actor: Actor,

    pub reason_note: Option<String>,

    /// Optional loan number to carry in the correlation bag.
    pub loan_number: Option<String>,
}

/// Moves quantity into a different condition, optionally relocating it in
/// the same operation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangeConditionCommand {
    pub source_bucket_id: Uuid,

    pub new_condition: Condition,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,

    /// When set, the destination bucket also changes location.
    pub destination: Option<LocationRef>,

    pub product: ProductRef,

    pub source_location: LocationRef,

    pub actor: Actor,

    pub reason_note: Option<String>,

    pub loan_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MovementSide {
    pub bucket_id: Uuid,
    pub on_hand: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MovementResult {
    pub from: MovementSide,
    pub to: MovementSide,
    pub correlation_id: Uuid,
    /// True when the move emptied the source bucket and it was removed.
    pub source_removed: bool,
}

struct MovementOutcome {
    result: MovementResult,
    product_id: Uuid,
    quantity: i32,
}

/// Atomic two-bucket movements: each call debits the source, credits the
/// destination, writes two ledger rows sharing one correlation id, and
/// garbage-collects the source if emptied, all in one unit of work.
#[derive(Clone)]
pub struct MovementService {
    runner: TxnRunner,
    event_sender: Arc<EventSender>,
}

impl MovementService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, retry: RetryConfig) -> Self {
        Self {
            runner: TxnRunner::new(db, retry),
            event_sender,
        }
    }

    /// Moves `quantity` units of the source bucket's `on_hand` to the same
    /// product/condition bucket at another location.
    #[instrument(skip(self, cmd), fields(source_bucket_id = %cmd.source_bucket_id, quantity = cmd.quantity))]
    pub async fn transfer(&self, cmd: TransferStockCommand) -> Result<MovementResult, ServiceError> {
        cmd.validate().map_err(|e| {
            STOCK_MOVEMENT_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::Validation(msg)
        })?;

        let outcome = self
            .runner
            .run(|txn| {
                let cmd = cmd.clone();
                Box::pin(async move { transfer_in_txn(txn, &cmd).await })
            })
            .await
            .map_err(|e| {
                STOCK_MOVEMENT_FAILURES.inc();
                e
            })?;

        self.publish(
            Event::StockTransferred {
                source_bucket_id: outcome.result.from.bucket_id,
                destination_bucket_id: outcome.result.to.bucket_id,
                product_id: outcome.product_id,
                quantity: outcome.quantity,
                correlation_id: outcome.result.correlation_id,
            },
            &outcome,
        )
        .await;

        STOCK_MOVEMENTS.inc();
        info!(
            correlation_id = %outcome.result.correlation_id,
            remaining = outcome.result.from.on_hand,
            "Stock transferred"
        );
        Ok(outcome.result)
    }

    /// Moves `quantity` units of the source bucket's `on_hand` into another
    /// condition, optionally at a different location.
    #[instrument(skip(self, cmd), fields(source_bucket_id = %cmd.source_bucket_id, quantity = cmd.quantity))]
    pub async fn change_condition(
        &self,
        cmd: ChangeConditionCommand,
    ) -> Result<MovementResult, ServiceError> {
        cmd.validate().map_err(|e| {
            STOCK_MOVEMENT_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::Validation(msg)
        })?;

        let outcome = self
            .runner
            .run(|txn| {
                let cmd = cmd.clone();
                Box::pin(async move { change_condition_in_txn(txn, &cmd).await })
            })
            .await
            .map_err(|e| {
                STOCK_MOVEMENT_FAILURES.inc();
                e
            })?;

        self.publish(
            Event::StockConditionChanged {
                source_bucket_id: outcome.result.from.bucket_id,
                destination_bucket_id: outcome.result.to.bucket_id,
                product_id: outcome.product_id,
                quantity: outcome.quantity,
                new_condition: cmd.new_condition.as_str().to_string(),
                correlation_id: outcome.result.correlation_id,
            },
            &outcome,
        )
        .await;

        STOCK_MOVEMENTS.inc();
        info!(
            correlation_id = %outcome.result.correlation_id,
            new_condition = cmd.new_condition.as_str(),
            "Stock condition changed"
        );
        Ok(outcome.result)
    }

    /// The movement has already committed when this runs; a consumer that
    /// cannot take the event is logged, never reported as a failure.
    async fn publish(&self, event: Event, outcome: &MovementOutcome) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "Failed to publish movement event");
        }

        if outcome.result.source_removed {
            if let Err(e) = self
                .event_sender
                .send(Event::BucketRemoved {
                    bucket_id: outcome.result.from.bucket_id,
                    product_id: outcome.product_id,
                })
                .await
            {
                warn!(error = %e, "Failed to publish bucket-removed event");
            }
        }
    }
}

async fn transfer_in_txn(
    txn: &DatabaseTransaction,
    cmd: &TransferStockCommand,
) -> Result<MovementOutcome, ServiceError> {
    let source = BalanceStore::get(txn, cmd.source_bucket_id).await?;
    check_references(&source.product_id, &cmd.product, &source, &cmd.source_location)?;

    if cmd
        .destination
        .same_place(source.warehouse_id, source.shelf_id)
    {
        return Err(ServiceError::InvalidTransition(
            "destination matches the source location".to_string(),
        ));
    }

    let source_key = BucketKey::from_bucket(&source)?;
    let destination_key = source_key.at_location(&cmd.destination);

    execute_movement(
        txn,
        source,
        &destination_key,
        cmd.quantity,
        ReasonCode::MoveInternal,
        MovementRefs {
            product: &cmd.product,
            source_location: &cmd.source_location,
            destination_location: &cmd.destination,
            actor: &cmd.actor,
            reason_note: cmd.reason_note.as_deref(),
            loan_number: cmd.loan_number.as_deref(),
        },
    )
    .await
}

async fn change_condition_in_txn(
    txn: &DatabaseTransaction,
    cmd: &ChangeConditionCommand,
) -> Result<MovementOutcome, ServiceError> {
    let source = BalanceStore::get(txn, cmd.source_bucket_id).await?;
    check_references(&source.product_id, &cmd.product, &source, &cmd.source_location)?;

    let destination_location = cmd.destination.as_ref().unwrap_or(&cmd.source_location);

    let source_key = BucketKey::from_bucket(&source)?;
    let destination_key = source_key
        .with_condition(cmd.new_condition)
        .at_location(destination_location);

    if destination_key == source_key {
        return Err(ServiceError::InvalidTransition(format!(
            "stock is already {} at this location",
            cmd.new_condition.as_str()
        )));
    }

    execute_movement(
        txn,
        source,
        &destination_key,
        cmd.quantity,
        ReasonCode::ChangeCondition,
        MovementRefs {
            product: &cmd.product,
            source_location: &cmd.source_location,
            destination_location,
            actor: &cmd.actor,
            reason_note: cmd.reason_note.as_deref(),
            loan_number: cmd.loan_number.as_deref(),
        },
    )
    .await
}

struct MovementRefs<'a> {
    product: &'a ProductRef,
    source_location: &'a LocationRef,
    destination_location: &'a LocationRef,
    actor: &'a Actor,
    reason_note: Option<&'a str>,
    loan_number: Option<&'a str>,
}

/// Shared body of both movement kinds: debit source, credit destination,
/// two ledger rows under one correlation id, then garbage-collect the
/// source if the move emptied it. Runs entirely inside the caller's
/// transaction; any failure rolls the whole movement back.
async fn execute_movement(
    txn: &DatabaseTransaction,
    source: crate::entities::inventory_bucket::Model,
    destination_key: &BucketKey,
    quantity: i32,
    reason_code: ReasonCode,
    refs: MovementRefs<'_>,
) -> Result<MovementOutcome, ServiceError> {
    if quantity > source.on_hand {
        return Err(ServiceError::InsufficientStock(format!(
            "stock insufficient, remaining: {}",
            source.on_hand
        )));
    }

    let source_key = BucketKey::from_bucket(&source)?;
    let source_id = source.id;
    let product_id = source.product_id;

    let destination = BalanceStore::get_or_create(txn, destination_key).await?;
    let destination_id = destination.id;

    let correlation_id = Uuid::new_v4();
    let correlation = json!({
        "source_bucket_id": source_id,
        "destination_bucket_id": destination_id,
        "product_id": product_id,
        "loan_number": refs.loan_number,
    });

    let debit_ctx = AdjustmentContext {
        reason_code,
        reason_note: refs.reason_note.map(str::to_string),
        actor: refs.actor.clone(),
        correlation_id,
        correlation: correlation.clone(),
        snapshot: LedgerSnapshot::new(refs.product, refs.source_location, source_key.condition),
    };
    let debit = apply_recorded(txn, source, StockField::OnHand, -quantity, &debit_ctx).await?;

    let credit_ctx = AdjustmentContext {
        reason_code,
        reason_note: refs.reason_note.map(str::to_string),
        actor: refs.actor.clone(),
        correlation_id,
        correlation,
        snapshot: LedgerSnapshot::new(
            refs.product,
            refs.destination_location,
            destination_key.condition,
        ),
    };
    let credit = apply_recorded(txn, destination, StockField::OnHand, quantity, &credit_ctx).await?;

    let source_removed = if debit.bucket.is_empty() {
        BalanceStore::delete_if_empty(txn, source_id).await?
    } else {
        false
    };

    Ok(MovementOutcome {
        result: MovementResult {
            from: MovementSide {
                bucket_id: source_id,
                on_hand: debit.after,
            },
            to: MovementSide {
                bucket_id: destination_id,
                on_hand: credit.after,
            },
            correlation_id,
            source_removed,
        },
        product_id,
        quantity,
    })
}

/// The caller supplies reference-data names for the snapshots; they must
/// describe the bucket being moved.
fn check_references(
    product_id: &Uuid,
    product: &ProductRef,
    source: &crate::entities::inventory_bucket::Model,
    source_location: &LocationRef,
) -> Result<(), ServiceError> {
    if product.id != *product_id {
        return Err(ServiceError::Validation(format!(
            "product reference {} does not match bucket product {}",
            product.id, product_id
        )));
    }
    if !source_location.same_place(source.warehouse_id, source.shelf_id) {
        return Err(ServiceError::Validation(
            "source location reference does not match the bucket's location".to_string(),
        ));
    }
    Ok(())
}
