use crate::db::DbPool;
use crate::entities::inventory_bucket;
use crate::entities::stock_adjustment::{self, Entity as StockAdjustment, ReasonCode, StockField};
use crate::errors::ServiceError;
use crate::models::{Actor, LedgerFilter, LedgerSnapshot, Paged, Pagination};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QueryTrait, Set,
};
use uuid::Uuid;

use super::balances::{AppliedDelta, BalanceStore};

/// Everything a ledger row records beyond the numbers themselves: why the
/// change happened, who asked for it, what it correlates with, and the
/// denormalized names that keep history readable after bucket deletion.
#[derive(Debug, Clone)]
pub struct AdjustmentContext {
    pub reason_code: ReasonCode,
    pub reason_note: Option<String>,
    pub actor: Actor,
    pub correlation_id: Uuid,
    pub correlation: serde_json::Value,
    pub snapshot: LedgerSnapshot,
}

/// A balance mutation together with the ledger row that documents it.
#[derive(Debug, Clone)]
pub struct RecordedDelta {
    pub bucket: inventory_bucket::Model,
    pub before: i32,
    pub after: i32,
    pub entry: stock_adjustment::Model,
}

/// Applies a delta to a bucket field and appends its audit row, as one
/// inseparable step inside the caller's transaction. This is the only
/// write path the movement and correction services use; the bare mutation
/// is never exposed, so a balance change without its ledger row (or the
/// reverse) cannot be expressed.
pub async fn apply_recorded<C: ConnectionTrait>(
    conn: &C,
    bucket: inventory_bucket::Model,
    field: StockField,
    delta: i32,
    ctx: &AdjustmentContext,
) -> Result<RecordedDelta, ServiceError> {
    let applied = BalanceStore::apply_delta(conn, bucket, field, delta).await?;
    let entry = LedgerWriter::record(conn, field, delta, &applied, ctx).await?;

    Ok(RecordedDelta {
        bucket: applied.bucket,
        before: applied.before,
        after: applied.after,
        entry,
    })
}

/// Appends audit rows. Never decides whether a change is valid; it only
/// records one that has already been validated and applied.
pub struct LedgerWriter;

impl LedgerWriter {
    pub(crate) async fn record<C: ConnectionTrait>(
        conn: &C,
        field: StockField,
        delta: i32,
        applied: &AppliedDelta,
        ctx: &AdjustmentContext,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        let bucket_id = applied.bucket.id;
        if delta == 0 {
            return Err(ServiceError::Integrity(format!(
                "refusing to record a zero delta for bucket {}",
                bucket_id
            )));
        }
        if applied.after != applied.before + delta {
            return Err(ServiceError::Integrity(format!(
                "bucket {} ledger row would not balance: {} != {} + {}",
                bucket_id, applied.after, applied.before, delta
            )));
        }

        let snapshot = serde_json::to_value(&ctx.snapshot)
            .map_err(|e| ServiceError::Integrity(format!("snapshot serialization failed: {}", e)))?;

        let entry = stock_adjustment::ActiveModel {
            id: Set(Uuid::new_v4()),
            bucket_id: Set(bucket_id),
            field: Set(field.as_str().to_string()),
            delta: Set(delta),
            quantity_before: Set(applied.before),
            quantity_after: Set(applied.after),
            reason_code: Set(ctx.reason_code.as_str().to_string()),
            reason_note: Set(ctx.reason_note.clone()),
            actor: Set(ctx.actor.to_json()),
            correlation_id: Set(ctx.correlation_id),
            correlation: Set(ctx.correlation.clone()),
            product_code: Set(ctx.snapshot.product_code.clone()),
            snapshot: Set(snapshot),
            ..Default::default()
        };

        entry.insert(conn).await.map_err(ServiceError::db_error)
    }

    /// Audit-trail query surface, newest first. Works entirely off the
    /// ledger's own columns so history stays queryable after the buckets
    /// it references are gone.
    pub async fn find(
        db: &DbPool,
        filter: &LedgerFilter,
        page: &Pagination,
    ) -> Result<Paged<stock_adjustment::Model>, ServiceError> {
        let query = StockAdjustment::find()
            .apply_if(filter.bucket_id, |q, v| {
                q.filter(stock_adjustment::Column::BucketId.eq(v))
            })
            .apply_if(filter.correlation_id, |q, v| {
                q.filter(stock_adjustment::Column::CorrelationId.eq(v))
            })
            .apply_if(filter.product_code.clone(), |q, v| {
                q.filter(stock_adjustment::Column::ProductCode.eq(v))
            })
            .apply_if(filter.field, |q, v| {
                q.filter(stock_adjustment::Column::Field.eq(v.as_str()))
            })
            .apply_if(filter.created_from, |q, v| {
                q.filter(stock_adjustment::Column::CreatedAt.gte(v))
            })
            .apply_if(filter.created_to, |q, v| {
                q.filter(stock_adjustment::Column::CreatedAt.lte(v))
            })
            .order_by_desc(stock_adjustment::Column::CreatedAt);

        let paginator = query.paginate(db, page.limit());
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.page_index())
            .await
            .map_err(ServiceError::db_error)?;

        Ok(Paged {
            items,
            total,
            page: page.page_index() + 1,
            limit: page.limit(),
        })
    }
}
