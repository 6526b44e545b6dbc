use crate::db::DbPool;
use crate::entities::inventory_bucket::{self, Entity as InventoryBucket};
use crate::entities::stock_adjustment::StockField;
use crate::errors::ServiceError;
use crate::models::{BucketFilter, BucketKey, Paged, Pagination};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QueryTrait, Set,
};
use tracing::{debug, error};
use uuid::Uuid;

/// Result of one balance mutation. `before` and `after` come from the same
/// write the mutation performed; callers never re-read to compute them.
#[derive(Debug, Clone)]
pub struct AppliedDelta {
    pub bucket: inventory_bucket::Model,
    pub before: i32,
    pub after: i32,
}

/// Sole owner of bucket state. Every read or write of `on_hand`/`on_loan`
/// passes through here; the movement and correction services only ever
/// reach balances via [`crate::services::ledger::apply_recorded`], which
/// pairs each mutation with its ledger row.
pub struct BalanceStore;

impl BalanceStore {
    /// Loads a bucket by id.
    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        bucket_id: Uuid,
    ) -> Result<inventory_bucket::Model, ServiceError> {
        InventoryBucket::find_by_id(bucket_id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Bucket {} not found", bucket_id)))
    }

    /// Looks a bucket up by its natural key.
    pub async fn find_by_key<C: ConnectionTrait>(
        conn: &C,
        key: &BucketKey,
    ) -> Result<Option<inventory_bucket::Model>, ServiceError> {
        let shelf_filter = match key.shelf_id {
            Some(shelf_id) => inventory_bucket::Column::ShelfId.eq(shelf_id),
            None => inventory_bucket::Column::ShelfId.is_null(),
        };

        InventoryBucket::find()
            .filter(inventory_bucket::Column::ProductId.eq(key.product_id))
            .filter(inventory_bucket::Column::WarehouseId.eq(key.warehouse_id))
            .filter(shelf_filter)
            .filter(inventory_bucket::Column::Condition.eq(key.condition.as_str()))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Finds the bucket for `key`, creating a zeroed one if absent.
    ///
    /// A concurrent creator of the same key trips the natural-key unique
    /// index; the violation maps to `Conflict` and the transaction runner
    /// re-runs the unit of work against the winner's row.
    pub async fn get_or_create<C: ConnectionTrait>(
        conn: &C,
        key: &BucketKey,
    ) -> Result<inventory_bucket::Model, ServiceError> {
        if let Some(bucket) = Self::find_by_key(conn, key).await? {
            return Ok(bucket);
        }

        let now = Utc::now();
        let bucket = inventory_bucket::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(key.product_id),
            warehouse_id: Set(key.warehouse_id),
            shelf_id: Set(key.shelf_id),
            condition: Set(key.condition.as_str().to_string()),
            on_hand: Set(0),
            on_loan: Set(0),
            last_in_at: Set(None),
            last_out_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = bucket.insert(conn).await.map_err(ServiceError::db_error)?;
        debug!(bucket_id = %created.id, "Created bucket for first stock-in");
        Ok(created)
    }

    /// Applies a signed delta to one field of a bucket.
    ///
    /// Fails with `InsufficientStock` before writing anything if the delta
    /// would drive the field negative, and with `Integrity` if the
    /// persisted value disagrees with `before + delta` afterwards.
    ///
    /// The write is guarded on the value this unit of work read: it only
    /// lands while the field still holds `before`. A concurrent writer that
    /// committed in between makes this a zero-row update, which surfaces as
    /// `Conflict` and sends the whole unit of work back through the retry
    /// loop for a fresh read. Read-committed backends silently apply both
    /// of two racing absolute writes, so the guard carries the
    /// serialization burden rather than the isolation level.
    pub(crate) async fn apply_delta<C: ConnectionTrait>(
        conn: &C,
        bucket: inventory_bucket::Model,
        field: StockField,
        delta: i32,
    ) -> Result<AppliedDelta, ServiceError> {
        let before = match field {
            StockField::OnHand => bucket.on_hand,
            StockField::OnLoan => bucket.on_loan,
        };
        let after = before.checked_add(delta).ok_or_else(|| {
            ServiceError::Validation(format!(
                "delta {} overflows the {} balance {}",
                delta,
                field.as_str(),
                before
            ))
        })?;

        if after < 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "stock insufficient, remaining: {}",
                before
            )));
        }

        let bucket_id = bucket.id;
        let now = Utc::now();
        let column = match field {
            StockField::OnHand => inventory_bucket::Column::OnHand,
            StockField::OnLoan => inventory_bucket::Column::OnLoan,
        };
        let stamp = if delta > 0 {
            inventory_bucket::Column::LastInAt
        } else {
            inventory_bucket::Column::LastOutAt
        };

        let update = InventoryBucket::update_many()
            .col_expr(column, Expr::value(after))
            .col_expr(stamp, Expr::value(now))
            .col_expr(inventory_bucket::Column::UpdatedAt, Expr::value(now))
            .filter(inventory_bucket::Column::Id.eq(bucket_id))
            .filter(column.eq(before))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        if update.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "bucket {} changed underneath this unit of work",
                bucket_id
            )));
        }

        let updated = Self::get(conn, bucket_id).await?;

        let persisted = match field {
            StockField::OnHand => updated.on_hand,
            StockField::OnLoan => updated.on_loan,
        };
        if persisted != after {
            error!(
                bucket_id = %bucket_id,
                field = field.as_str(),
                before,
                delta,
                persisted,
                "Persisted balance disagrees with computed value"
            );
            return Err(ServiceError::Integrity(format!(
                "bucket {} field {}: persisted {} != {} + {}",
                bucket_id,
                field.as_str(),
                persisted,
                before,
                delta
            )));
        }

        Ok(AppliedDelta {
            bucket: updated,
            before,
            after,
        })
    }

    /// Removes the bucket row only when both fields are exactly zero.
    /// Returns whether a row was deleted. Called as the last step of any
    /// decrementing operation; ledger rows survive via their snapshots.
    pub async fn delete_if_empty<C: ConnectionTrait>(
        conn: &C,
        bucket_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let Some(bucket) = InventoryBucket::find_by_id(bucket_id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
        else {
            return Ok(false);
        };

        if !bucket.is_empty() {
            return Ok(false);
        }

        bucket.delete(conn).await.map_err(ServiceError::db_error)?;
        debug!(bucket_id = %bucket_id, "Garbage-collected empty bucket");
        Ok(true)
    }

    /// Read-only reporting surface; carries no invariant responsibility.
    pub async fn find(
        db: &DbPool,
        filter: &BucketFilter,
        page: &Pagination,
    ) -> Result<Paged<inventory_bucket::Model>, ServiceError> {
        let query = InventoryBucket::find()
            .apply_if(filter.product_id, |q, v| {
                q.filter(inventory_bucket::Column::ProductId.eq(v))
            })
            .apply_if(filter.warehouse_id, |q, v| {
                q.filter(inventory_bucket::Column::WarehouseId.eq(v))
            })
            .apply_if(filter.shelf_id, |q, v| {
                q.filter(inventory_bucket::Column::ShelfId.eq(v))
            })
            .apply_if(filter.condition, |q, v| {
                q.filter(inventory_bucket::Column::Condition.eq(v.as_str()))
            })
            .order_by_asc(inventory_bucket::Column::CreatedAt);

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
