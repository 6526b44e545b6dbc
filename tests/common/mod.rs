#![allow(dead_code)]

use chrono::Utc;
use fieldops_inventory::db::{self, DbConfig, DbPool};
use fieldops_inventory::entities::inventory_bucket::{self, Condition};
use fieldops_inventory::events::{self, EventSender};
use fieldops_inventory::models::{Actor, LocationRef, ProductRef};
use fieldops_inventory::services::{CorrectionService, MovementService, RetryConfig};
use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Opens a private in-memory SQLite database and applies migrations. Each
/// call gets its own named shared-cache database so parallel tests never
/// see each other's state.
pub async fn setup_db() -> Arc<DbPool> {
    setup_db_with_connections(1).await
}

pub async fn setup_db_with_connections(max_connections: u32) -> Arc<DbPool> {
    let config = DbConfig {
        url: format!(
            "sqlite:file:{}?mode=memory&cache=shared",
            Uuid::new_v4().simple()
        ),
        max_connections,
        min_connections: 1,
        connect_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(600),
        acquire_timeout: Duration::from_secs(5),
    };

    let pool = db::establish_connection_with_config(&config)
        .await
        .expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");
    Arc::new(pool)
}

/// Event sender with a drained receiver, so sends never block on a full
/// channel.
pub fn event_sender() -> Arc<EventSender> {
    let (sender, rx) = events::event_channel(100);
    tokio::spawn(events::process_events(rx));
    Arc::new(sender)
}

pub fn movement_service(db: Arc<DbPool>) -> MovementService {
    MovementService::new(db, event_sender(), RetryConfig::default())
}

pub fn correction_service(db: Arc<DbPool>) -> CorrectionService {
    CorrectionService::new(db, event_sender(), RetryConfig::default())
}

pub fn test_actor() -> Actor {
    Actor::Employee {
        id: Uuid::new_v4(),
        name: "A. Fielder".into(),
    }
}

pub fn drill() -> ProductRef {
    ProductRef {
        id: Uuid::new_v4(),
        code: "DRILL-001".into(),
        name: "Cordless Drill XR".into(),
    }
}

pub fn main_warehouse() -> LocationRef {
    LocationRef {
        warehouse_id: Uuid::new_v4(),
        warehouse_name: "Main Warehouse".into(),
        shelf_id: Some(Uuid::new_v4()),
        shelf_name: Some("A-01".into()),
    }
}

pub fn secondary_warehouse() -> LocationRef {
    LocationRef {
        warehouse_id: Uuid::new_v4(),
        warehouse_name: "Secondary Warehouse".into(),
        shelf_id: None,
        shelf_name: None,
    }
}

/// Inserts a bucket row directly, bypassing the engine, for seeding.
pub async fn seed_bucket(
    db: &DbPool,
    product: &ProductRef,
    location: &LocationRef,
    condition: Condition,
    on_hand: i32,
    on_loan: i32,
) -> inventory_bucket::Model {
    let now = Utc::now();
    inventory_bucket::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        warehouse_id: Set(location.warehouse_id),
        shelf_id: Set(location.shelf_id),
        condition: Set(condition.as_str().to_string()),
        on_hand: Set(on_hand),
        on_loan: Set(on_loan),
        last_in_at: Set(None),
        last_out_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed bucket")
}
