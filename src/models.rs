use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::entities::inventory_bucket::{self, Condition};
use crate::entities::stock_adjustment::StockField;
use crate::errors::ServiceError;

/// Resolved identity of whoever requested an operation. Resolution (HR
/// lookup, admin directory, auth token) is entirely the caller's job; the
/// engine only records what it is handed. There is no implicit fallback:
/// system-initiated flows must say so with `Actor::System`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    Employee { id: Uuid, name: String },
    Admin { id: Uuid, name: String },
    System,
}

impl Actor {
    pub fn display_name(&self) -> &str {
        match self {
            Actor::Employee { name, .. } | Actor::Admin { name, .. } => name,
            Actor::System => "system",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Serialization of this enum is infallible.
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "kind": "system" }))
    }
}

/// Natural key of a bucket: the unique (product, warehouse, shelf,
/// condition) unit of stock tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketKey {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub shelf_id: Option<Uuid>,
    pub condition: Condition,
}

impl BucketKey {
    pub fn from_bucket(bucket: &inventory_bucket::Model) -> Result<Self, ServiceError> {
        let condition = bucket.condition().ok_or_else(|| {
            ServiceError::Integrity(format!(
                "bucket {} carries unknown condition '{}'",
                bucket.id, bucket.condition
            ))
        })?;
        Ok(Self {
            product_id: bucket.product_id,
            warehouse_id: bucket.warehouse_id,
            shelf_id: bucket.shelf_id,
            condition,
        })
    }

    /// Same product and condition, different physical location.
    pub fn at_location(&self, location: &LocationRef) -> Self {
        Self {
            warehouse_id: location.warehouse_id,
            shelf_id: location.shelf_id,
            ..self.clone()
        }
    }

    pub fn with_condition(&self, condition: Condition) -> Self {
        Self {
            condition,
            ..self.clone()
        }
    }
}

/// Denormalized product reference data, supplied by the caller from its
/// product catalog and written verbatim into ledger snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

/// A physical location plus its display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRef {
    pub warehouse_id: Uuid,
    pub warehouse_name: String,
    pub shelf_id: Option<Uuid>,
    pub shelf_name: Option<String>,
}

impl LocationRef {
    /// Location identity only; names do not participate in key comparisons.
    pub fn same_place(&self, warehouse_id: Uuid, shelf_id: Option<Uuid>) -> bool {
        self.warehouse_id == warehouse_id && self.shelf_id == shelf_id
    }
}

/// Names captured at write time so ledger rows outlive bucket deletion and
/// reference-data renames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub product_code: String,
    pub product_name: String,
    pub warehouse_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shelf_name: Option<String>,
    pub condition: String,
}

impl LedgerSnapshot {
    pub fn new(product: &ProductRef, location: &LocationRef, condition: Condition) -> Self {
        Self {
            product_code: product.code.clone(),
            product_name: product.name.clone(),
            warehouse_name: location.warehouse_name.clone(),
            shelf_name: location.shelf_name.clone(),
            condition: condition.as_str().to_string(),
        }
    }
}

/// Filters for the bucket listing surface.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketFilter {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub shelf_id: Option<Uuid>,
    pub condition: Option<Condition>,
}

/// Filters for the ledger listing surface.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerFilter {
    pub bucket_id: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
    pub product_code: Option<String>,
    pub field: Option<StockField>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

/// 1-based page selection for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl Pagination {
    /// Zero-based page index for the paginator; a page of 0 reads as 1.
    pub fn page_index(&self) -> u64 {
        self.page.saturating_sub(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit.clamp(1, 200)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}
