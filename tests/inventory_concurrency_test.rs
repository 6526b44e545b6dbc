mod common;

use common::*;
use fieldops_inventory::entities::inventory_bucket::{Condition, Entity as InventoryBucket};
use fieldops_inventory::errors::ServiceError;
use fieldops_inventory::services::movements::TransferStockCommand;
use sea_orm::EntityTrait;

// Runs over shared-cache SQLite with a multi-connection pool: contending
// writers surface as lock errors or guard misses, both of which classify
// as Conflict and go back through the retry loop with a fresh read.
#[tokio::test]
async fn inventory_concurrency_never_oversubscribes() {
    let db = setup_db_with_connections(4).await;
    let product = drill();
    let source_location = main_warehouse();
    let destination = secondary_warehouse();

    let source = seed_bucket(&db, &product, &source_location, Condition::Good, 10, 0).await;
    let service = movement_service(db.clone());

    // Two concurrent transfers of 6 from a bucket holding 10: at most one
    // may commit; the loser fails with InsufficientStock or exhausts its
    // conflict retries.
    let mut tasks = vec![];
    for _ in 0..2 {
        let service = service.clone();
        let cmd = TransferStockCommand {
            source_bucket_id: source.id,
            destination: destination.clone(),
            quantity: 6,
            product: product.clone(),
            source_location: source_location.clone(),
            actor: test_actor(),
            reason_note: None,
            loan_number: None,
        };
        tasks.push(tokio::spawn(async move { service.transfer(cmd).await }));
    }

    let mut successes = 0;
    for task in tasks {
        match task.await.expect("task join") {
            Ok(_) => successes += 1,
            Err(ServiceError::InsufficientStock(_)) | Err(ServiceError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(
        successes <= 1,
        "two 6-unit draws from 10 cannot both succeed; got {}",
        successes
    );

    let remaining = InventoryBucket::find_by_id(source.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .map(|b| b.on_hand)
        .unwrap_or(0);
    assert!(remaining >= 0, "bucket never goes negative");
    assert_eq!(remaining, 10 - 6 * successes);
}

// Wider sweep: twenty 1-unit draws through one pool. Left out of the
// default run because heavy SQLite lock churn can exhaust retry budgets;
// run with: cargo test -- --ignored concurrent_unit_draws
#[tokio::test]
#[ignore]
async fn concurrent_unit_draws_stop_at_zero() {
    let db = setup_db_with_connections(4).await;
    let product = drill();
    let source_location = main_warehouse();
    let destination = secondary_warehouse();

    let source = seed_bucket(&db, &product, &source_location, Condition::Good, 10, 0).await;
    let service = movement_service(db.clone());

    let mut tasks = vec![];
    for _ in 0..20 {
        let service = service.clone();
        let cmd = TransferStockCommand {
            source_bucket_id: source.id,
            destination: destination.clone(),
            quantity: 1,
            product: product.clone(),
            source_location: source_location.clone(),
            actor: test_actor(),
            reason_note: None,
            loan_number: None,
        };
        tasks.push(tokio::spawn(async move {
            service.transfer(cmd).await.is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap_or(false) {
            successes += 1;
        }
    }
    assert!(
        successes <= 10,
        "at most 10 unit draws can succeed; got {}",
        successes
    );
}
