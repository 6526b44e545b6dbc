use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Physical state dimension of stock, orthogonal to location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Good,
    Damaged,
    Maintenance,
    Lost,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Good => "good",
            Condition::Damaged => "damaged",
            Condition::Maintenance => "maintenance",
            Condition::Lost => "lost",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "good" => Some(Condition::Good),
            "damaged" => Some(Condition::Damaged),
            "maintenance" => Some(Condition::Maintenance),
            "lost" => Some(Condition::Lost),
            _ => None,
        }
    }
}

/// One row per (product, warehouse, shelf, condition) bucket. Rows exist
/// only while the bucket holds stock: the first stock-in creates the row
/// and the decrement that empties both fields removes it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_buckets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub shelf_id: Option<Uuid>,
    pub condition: String, // Stored as string in DB, converted to/from Condition
    pub on_hand: i32,
    pub on_loan: i32,
    pub last_in_at: Option<DateTime<Utc>>,
    pub last_out_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn condition(&self) -> Option<Condition> {
        Condition::from_str(&self.condition)
    }

    pub fn is_empty(&self) -> bool {
        self.on_hand == 0 && self.on_loan == 0
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
