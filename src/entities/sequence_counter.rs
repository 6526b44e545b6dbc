use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Named counter backing human-readable document numbers (loan numbers,
/// voucher numbers). Incremented inside a transaction, never read-modify-
/// written outside one.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sequence_counters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub prefix: String,
    pub current_value: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
