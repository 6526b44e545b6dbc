use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Which bucket field an adjustment touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockField {
    OnHand,
    OnLoan,
}

impl StockField {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockField::OnHand => "on_hand",
            StockField::OnLoan => "on_loan",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "on_hand" => Some(StockField::OnHand),
            "on_loan" => Some(StockField::OnLoan),
            _ => None,
        }
    }
}

/// Enumerated cause of an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    LoanOut,
    ReturnIn,
    MoveInternal,
    ChangeCondition,
    ManualCorrection,
    MarkLost,
    RevertLoanOut,
    RevertReturnIn,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::LoanOut => "LOAN_OUT",
            ReasonCode::ReturnIn => "RETURN_IN",
            ReasonCode::MoveInternal => "MOVE_INTERNAL",
            ReasonCode::ChangeCondition => "CHANGE_CONDITION",
            ReasonCode::ManualCorrection => "MANUAL_CORRECTION",
            ReasonCode::MarkLost => "MARK_LOST",
            ReasonCode::RevertLoanOut => "REVERT_LOAN_OUT",
            ReasonCode::RevertReturnIn => "REVERT_RETURN_IN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "LOAN_OUT" => Some(ReasonCode::LoanOut),
            "RETURN_IN" => Some(ReasonCode::ReturnIn),
            "MOVE_INTERNAL" => Some(ReasonCode::MoveInternal),
            "CHANGE_CONDITION" => Some(ReasonCode::ChangeCondition),
            "MANUAL_CORRECTION" => Some(ReasonCode::ManualCorrection),
            "MARK_LOST" => Some(ReasonCode::MarkLost),
            "REVERT_LOAN_OUT" => Some(ReasonCode::RevertLoanOut),
            "REVERT_RETURN_IN" => Some(ReasonCode::RevertReturnIn),
            _ => None,
        }
    }
}

/// Append-only audit row documenting one before/after change to one bucket
/// field. Rows are never updated or deleted; `snapshot` carries the
/// denormalized product/warehouse/shelf names so history stays readable
/// after the bucket (or its reference data) is gone. There is deliberately
/// no foreign key back to `inventory_buckets`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_adjustments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub bucket_id: Uuid,
    pub field: String, // Stored as string in DB, converted to/from StockField
    pub delta: i32,
    pub quantity_before: i32,
    pub quantity_after: i32,
    pub reason_code: String,
    pub reason_note: Option<String>,
    pub actor: Json,
    /// Groups the two rows written by one movement.
    pub correlation_id: Uuid,
    /// Opaque bag of related ids (paired bucket ids, product id, loan number).
    pub correlation: Json,
    /// Denormalized for indexed audit queries; also present in `snapshot`.
    pub product_code: String,
    pub snapshot: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
