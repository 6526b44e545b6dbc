mod common;

use assert_matches::assert_matches;
use common::*;
use fieldops_inventory::entities::inventory_bucket::{Condition, Entity as InventoryBucket};
use fieldops_inventory::entities::stock_adjustment::{
    self, Entity as StockAdjustment, ReasonCode, StockField,
};
use fieldops_inventory::errors::ServiceError;
use fieldops_inventory::events;
use fieldops_inventory::services::corrections::{AdjustStockCommand, ReceiveStockCommand};
use fieldops_inventory::services::{CorrectionService, RetryConfig};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;

#[tokio::test]
async fn adjust_applies_delta_and_records_ledger_row() {
    let db = setup_db().await;
    let product = drill();
    let location = main_warehouse();

    let bucket = seed_bucket(&db, &product, &location, Condition::Good, 10, 0).await;
    let service = correction_service(db.clone());

    let result = service
        .adjust(AdjustStockCommand {
            bucket_id: bucket.id,
            field: StockField::OnHand,
            delta: -3,
            reason_code: ReasonCode::ManualCorrection,
            reason_note: Some("cycle count found 7".into()),
            actor: test_actor(),
            product: product.clone(),
            location: location.clone(),
            loan_number: None,
        })
        .await
        .expect("adjust");

    assert_eq!(result.before, 10);
    assert_eq!(result.after, 7);
    assert!(!result.bucket_removed);

    let rows = StockAdjustment::find()
        .filter(stock_adjustment::Column::BucketId.eq(bucket.id))
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].delta, -3);
    assert_eq!(rows[0].quantity_before, 10);
    assert_eq!(rows[0].quantity_after, 7);
    assert_eq!(rows[0].reason_code, "MANUAL_CORRECTION");
    assert_eq!(rows[0].reason_note.as_deref(), Some("cycle count found 7"));
}

#[tokio::test]
async fn adjust_rejects_zero_delta_without_touching_storage() {
    let db = setup_db().await;
    let product = drill();
    let location = main_warehouse();
    let bucket = seed_bucket(&db, &product, &location, Condition::Good, 5, 0).await;
    let service = correction_service(db.clone());

    let err = service
        .adjust(AdjustStockCommand {
            bucket_id: bucket.id,
            field: StockField::OnHand,
            delta: 0,
            reason_code: ReasonCode::ManualCorrection,
            reason_note: None,
            actor: test_actor(),
            product,
            location,
            loan_number: None,
        })
        .await
        .expect_err("zero delta should fail");
    assert_matches!(err, ServiceError::Validation(_));

    let rows = StockAdjustment::find().all(db.as_ref()).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn adjust_rejects_overdraw() {
    let db = setup_db().await;
    let product = drill();
    let location = main_warehouse();
    let bucket = seed_bucket(&db, &product, &location, Condition::Good, 4, 0).await;
    let service = correction_service(db.clone());

    let err = service
        .adjust(AdjustStockCommand {
            bucket_id: bucket.id,
            field: StockField::OnHand,
            delta: -5,
            reason_code: ReasonCode::ManualCorrection,
            reason_note: None,
            actor: test_actor(),
            product,
            location,
            loan_number: None,
        })
        .await
        .expect_err("overdraw should fail");
    assert_matches!(err, ServiceError::InsufficientStock(_));

    let row = InventoryBucket::find_by_id(bucket.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .expect("bucket unchanged");
    assert_eq!(row.on_hand, 4);
    assert!(StockAdjustment::find()
        .all(db.as_ref())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn adjust_to_zero_garbage_collects_bucket() {
    let db = setup_db().await;
    let product = drill();
    let location = main_warehouse();
    let bucket = seed_bucket(&db, &product, &location, Condition::Good, 10, 0).await;
    let service = correction_service(db.clone());

    let result = service
        .adjust(AdjustStockCommand {
            bucket_id: bucket.id,
            field: StockField::OnHand,
            delta: -10,
            reason_code: ReasonCode::ManualCorrection,
            reason_note: None,
            actor: test_actor(),
            product,
            location,
            loan_number: None,
        })
        .await
        .expect("adjust");

    assert_eq!(result.after, 0);
    assert!(result.bucket_removed);

    let row = InventoryBucket::find_by_id(bucket.id)
        .one(db.as_ref())
        .await
        .unwrap();
    assert!(row.is_none(), "empty bucket is gone");

    // History survives the bucket.
    let rows = StockAdjustment::find()
        .filter(stock_adjustment::Column::BucketId.eq(bucket.id))
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn adjust_keeps_bucket_while_other_field_is_positive() {
    let db = setup_db().await;
    let product = drill();
    let location = main_warehouse();
    let bucket = seed_bucket(&db, &product, &location, Condition::Good, 2, 3).await;
    let service = correction_service(db.clone());

    let result = service
        .adjust(AdjustStockCommand {
            bucket_id: bucket.id,
            field: StockField::OnHand,
            delta: -2,
            reason_code: ReasonCode::LoanOut,
            reason_note: None,
            actor: test_actor(),
            product,
            location,
            loan_number: Some("LN-000007".into()),
        })
        .await
        .expect("adjust");

    assert!(!result.bucket_removed, "on_loan still positive");
    let row = InventoryBucket::find_by_id(bucket.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .expect("bucket stays");
    assert_eq!(row.on_hand, 0);
    assert_eq!(row.on_loan, 3);
}

#[tokio::test]
async fn adjust_tracks_on_loan_field_independently() {
    let db = setup_db().await;
    let product = drill();
    let location = main_warehouse();
    let bucket = seed_bucket(&db, &product, &location, Condition::Good, 5, 1).await;
    let service = correction_service(db.clone());

    let result = service
        .adjust(AdjustStockCommand {
            bucket_id: bucket.id,
            field: StockField::OnLoan,
            delta: 2,
            reason_code: ReasonCode::LoanOut,
            reason_note: None,
            actor: test_actor(),
            product,
            location,
            loan_number: Some("LN-000008".into()),
        })
        .await
        .expect("adjust");

    assert_eq!(result.before, 1);
    assert_eq!(result.after, 3);

    let row = InventoryBucket::find_by_id(bucket.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.on_hand, 5, "on_hand untouched");
    assert_eq!(row.on_loan, 3);
}

#[tokio::test]
async fn adjust_unknown_bucket_is_not_found() {
    let db = setup_db().await;
    let service = correction_service(db.clone());

    let err = service
        .adjust(AdjustStockCommand {
            bucket_id: uuid::Uuid::new_v4(),
            field: StockField::OnHand,
            delta: 1,
            reason_code: ReasonCode::ManualCorrection,
            reason_note: None,
            actor: test_actor(),
            product: drill(),
            location: main_warehouse(),
            loan_number: None,
        })
        .await
        .expect_err("unknown bucket");
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn receive_creates_bucket_on_first_stock_in() {
    let db = setup_db().await;
    let product = drill();
    let location = main_warehouse();
    let service = correction_service(db.clone());

    let result = service
        .receive(ReceiveStockCommand {
            product: product.clone(),
            location: location.clone(),
            condition: Condition::Good,
            field: StockField::OnHand,
            quantity: 8,
            reason_code: ReasonCode::ReturnIn,
            reason_note: None,
            actor: test_actor(),
            loan_number: Some("LN-000042".into()),
        })
        .await
        .expect("receive");

    assert_eq!(result.before, 0);
    assert_eq!(result.after, 8);

    let row = InventoryBucket::find_by_id(result.bucket_id)
        .one(db.as_ref())
        .await
        .unwrap()
        .expect("bucket created");
    assert_eq!(row.on_hand, 8);
    assert_eq!(row.product_id, product.id);
    assert!(row.last_in_at.is_some());

    // A second receive reuses the same bucket.
    let again = service
        .receive(ReceiveStockCommand {
            product,
            location,
            condition: Condition::Good,
            field: StockField::OnHand,
            quantity: 2,
            reason_code: ReasonCode::ReturnIn,
            reason_note: None,
            actor: test_actor(),
            loan_number: None,
        })
        .await
        .expect("receive again");
    assert_eq!(again.bucket_id, result.bucket_id);
    assert_eq!(again.after, 10);
}

#[tokio::test]
async fn sequential_oversubscription_fails_cleanly() {
    let db = setup_db().await;
    let product = drill();
    let location = main_warehouse();
    let bucket = seed_bucket(&db, &product, &location, Condition::Good, 10, 0).await;
    let service = correction_service(db.clone());

    let first = service
        .adjust(AdjustStockCommand {
            bucket_id: bucket.id,
            field: StockField::OnHand,
            delta: -6,
            reason_code: ReasonCode::LoanOut,
            reason_note: None,
            actor: test_actor(),
            product: product.clone(),
            location: location.clone(),
            loan_number: None,
        })
        .await
        .expect("first draw");
    assert_eq!(first.after, 4);

    let err = service
        .adjust(AdjustStockCommand {
            bucket_id: bucket.id,
            field: StockField::OnHand,
            delta: -6,
            reason_code: ReasonCode::LoanOut,
            reason_note: None,
            actor: test_actor(),
            product,
            location,
            loan_number: None,
        })
        .await
        .expect_err("second draw exceeds remaining stock");
    assert_matches!(err, ServiceError::InsufficientStock(_));

    let row = InventoryBucket::find_by_id(bucket.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.on_hand, 4, "never negative, second draw rolled back");
}

#[tokio::test]
async fn adjust_commits_even_when_event_consumer_is_gone() {
    let db = setup_db().await;
    let product = drill();
    let location = main_warehouse();
    let bucket = seed_bucket(&db, &product, &location, Condition::Good, 10, 0).await;

    // Closed channel: every post-commit send fails.
    let (sender, rx) = events::event_channel(1);
    drop(rx);
    let service = CorrectionService::new(db.clone(), Arc::new(sender), RetryConfig::default());

    let result = service
        .adjust(AdjustStockCommand {
            bucket_id: bucket.id,
            field: StockField::OnHand,
            delta: -10,
            reason_code: ReasonCode::ManualCorrection,
            reason_note: None,
            actor: test_actor(),
            product,
            location,
            loan_number: None,
        })
        .await
        .expect("committed adjustment reports success");

    assert_eq!(result.after, 0);
    assert!(result.bucket_removed, "bucket-removed path also tolerated");

    let rows = StockAdjustment::find().all(db.as_ref()).await.unwrap();
    assert_eq!(rows.len(), 1, "ledger row durably committed");
}

#[tokio::test]
async fn adjust_rejects_delta_that_overflows_the_balance() {
    let db = setup_db().await;
    let product = drill();
    let location = main_warehouse();
    let bucket = seed_bucket(&db, &product, &location, Condition::Good, 10, 0).await;
    let service = correction_service(db.clone());

    let err = service
        .adjust(AdjustStockCommand {
            bucket_id: bucket.id,
            field: StockField::OnHand,
            delta: i32::MAX,
            reason_code: ReasonCode::ManualCorrection,
            reason_note: None,
            actor: test_actor(),
            product,
            location,
            loan_number: None,
        })
        .await
        .expect_err("overflowing delta must fail");
    assert_matches!(err, ServiceError::Validation(_));

    let row = InventoryBucket::find_by_id(bucket.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .expect("bucket unchanged");
    assert_eq!(row.on_hand, 10);
}
