use crate::{
    db::DbPool,
    entities::{
        inventory::{self, Entity as Inventory},
        inventory_transaction::{self, Entity as InventoryTransaction, TransactionType},
        product::{self, Entity as Product},
        recent_activity::ActivityType,
    },
    errors::ServiceError,
    services::activity::{record_activity, NewActivity},
};
use chrono::{Days, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// A stock change to apply to one product.
#[derive(Debug, Clone)]
pub struct StockMovement {
    pub product_id: Uuid,
    pub transaction_type: TransactionType,
    pub quantity: i32,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub created_by: Option<Uuid>,
    /// Apply `quantity` as a signed delta whatever the transaction type.
    apply_as_delta: bool,
}

impl StockMovement {
    pub fn new(product_id: Uuid, transaction_type: TransactionType, quantity: i32) -> Self {
        Self {
            product_id,
            transaction_type,
            quantity,
            reference: None,
            reason: None,
            created_by: None,
            apply_as_delta: false,
        }
    }

    /// Manual correction: the stock moves by `delta` and the row is labelled
    /// with `transaction_type`.
    pub fn signed_adjustment(product_id: Uuid, transaction_type: TransactionType, delta: i32) -> Self {
        Self {
            apply_as_delta: true,
            ..Self::new(product_id, transaction_type, delta)
        }
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn by(mut self, user_id: Option<Uuid>) -> Self {
        self.created_by = user_id;
        self
    }

    pub fn next_stock(&self, current_stock: i32) -> i32 {
        if self.apply_as_delta {
            TransactionType::Adjustment.apply(current_stock, self.quantity)
        } else {
            self.transaction_type.apply(current_stock, self.quantity)
        }
    }

    fn adds_stock(&self) -> bool {
        if self.quantity < 0 {
            return false;
        }
        self.apply_as_delta || self.transaction_type != TransactionType::Out
    }
}

/// Inventory row for a product, created at zero stock if missing.
pub async fn ensure_inventory_row<C>(db: &C, product_id: Uuid) -> Result<inventory::Model, ServiceError>
where
    C: ConnectionTrait,
{
    if let Some(row) = Inventory::find()
        .filter(inventory::Column::ProductId.eq(product_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
    {
        return Ok(row);
    }

    inventory::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        current_stock: Set(0),
        last_updated: Set(Utc::now()),
    }
    .insert(db)
    .await
    .map_err(ServiceError::db_error)
}

/// Applies a movement to the product's stock, records the transaction with
/// its before/after levels and appends an inventory activity.
pub async fn record_transaction<C>(
    db: &C,
    movement: StockMovement,
) -> Result<inventory_transaction::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let product = Product::find_by_id(movement.product_id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Product", movement.product_id))?;

    let row = ensure_inventory_row(db, product.id).await?;
    let previous_stock = row.current_stock;
    let new_stock = movement.next_stock(previous_stock);
    let now = Utc::now();

    let mut stock: inventory::ActiveModel = row.into();
    stock.current_stock = Set(new_stock);
    stock.last_updated = Set(now);
    stock.update(db).await.map_err(ServiceError::db_error)?;

    let transaction = inventory_transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        transaction_type: Set(movement.transaction_type),
        quantity: Set(movement.quantity),
        previous_stock: Set(previous_stock),
        new_stock: Set(new_stock),
        reference: Set(movement.reference.clone()),
        reason: Set(movement.reason.clone()),
        created_by: Set(movement.created_by),
        created_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(ServiceError::db_error)?;

    let action = if movement.adds_stock() {
        "added to"
    } else {
        "removed from"
    };
    record_activity(
        db,
        NewActivity::new(
            ActivityType::Inventory,
            format!("Inventory {}", movement.transaction_type),
            format!(
                "{} units of {} {} inventory",
                movement.quantity.unsigned_abs(),
                product.name,
                action
            ),
        )
        .reference(transaction.id.to_string())
        .by(movement.created_by),
    )
    .await?;

    info!(
        product_id = %product.id,
        transaction_type = %movement.transaction_type,
        previous_stock,
        new_stock,
        "inventory transaction recorded"
    );
    Ok(transaction)
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub product_id: Option<Uuid>,
    pub transaction_type: Option<TransactionType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub type StockLevel = (inventory::Model, Option<product::Model>);
pub type TransactionRecord = (inventory_transaction::Model, Option<product::Model>);

fn low_stock_condition() -> sea_orm::sea_query::SimpleExpr {
    Expr::col((Inventory, inventory::Column::CurrentStock))
        .lte(Expr::col((Product, product::Column::ReorderLevel)))
}

/// Service for stock levels and inventory transactions
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_inventory(
        &self,
        product_id: Option<Uuid>,
        low_stock: Option<bool>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<StockLevel>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = Inventory::find().find_also_related(Product);

        if let Some(product_id) = product_id {
            query = query.filter(inventory::Column::ProductId.eq(product_id));
        }
        match low_stock {
            Some(true) => query = query.filter(low_stock_condition()),
            Some(false) => {
                query = query.filter(
                    Expr::col((Inventory, inventory::Column::CurrentStock))
                        .gt(Expr::col((Product, product::Column::ReorderLevel))),
                )
            }
            None => {}
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .paginate(db, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((rows, total))
    }

    #[instrument(skip(self))]
    pub async fn get_inventory(&self, id: Uuid) -> Result<StockLevel, ServiceError> {
        Inventory::find_by_id(id)
            .find_also_related(Product)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Inventory", id))
    }

    /// Rows at or below their product's reorder level, lowest stock first.
    #[instrument(skip(self))]
    pub async fn low_stock_items(&self, limit: Option<u64>) -> Result<Vec<StockLevel>, ServiceError> {
        let mut query = Inventory::find()
            .find_also_related(Product)
            .filter(low_stock_condition())
            .order_by_asc(inventory::Column::CurrentStock);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        query
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn low_stock_count(&self) -> Result<u64, ServiceError> {
        Inventory::find()
            .find_also_related(Product)
            .filter(low_stock_condition())
            .count(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Moves stock by a signed amount, floored at zero.
    #[instrument(skip(self))]
    pub async fn adjust(
        &self,
        product_id: Uuid,
        adjustment_value: i32,
        transaction_type: TransactionType,
        reason: String,
        reference: Option<String>,
        user_id: Option<Uuid>,
    ) -> Result<inventory_transaction::Model, ServiceError> {
        if reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "reason is required for adjustments".to_string(),
            ));
        }

        let mut movement =
            StockMovement::signed_adjustment(product_id, transaction_type, adjustment_value)
                .reason(Some(reason))
                .by(user_id);
        movement.reference = reference;

        record_transaction(&*self.db_pool, movement).await
    }

    #[instrument(skip(self))]
    pub async fn create_transaction(
        &self,
        movement: StockMovement,
    ) -> Result<inventory_transaction::Model, ServiceError> {
        if movement.transaction_type != TransactionType::Adjustment && movement.quantity < 0 {
            return Err(ServiceError::ValidationError(
                "quantity must not be negative for in/out transactions".to_string(),
            ));
        }
        record_transaction(&*self.db_pool, movement).await
    }

    #[instrument(skip(self))]
    pub async fn list_transactions(
        &self,
        filter: TransactionFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<TransactionRecord>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = InventoryTransaction::find().find_also_related(Product);

        if let Some(product_id) = filter.product_id {
            query = query.filter(inventory_transaction::Column::ProductId.eq(product_id));
        }
        if let Some(kind) = filter.transaction_type {
            query = query.filter(inventory_transaction::Column::TransactionType.eq(kind));
        }
        if let Some(start) = filter.start_date {
            query = query.filter(
                inventory_transaction::Column::CreatedAt.gte(start.and_time(NaiveTime::MIN).and_utc()),
            );
        }
        if let Some(end) = filter.end_date.and_then(|d| d.checked_add_days(Days::new(1))) {
            query = query.filter(
                inventory_transaction::Column::CreatedAt.lt(end.and_time(NaiveTime::MIN).and_utc()),
            );
        }

        let paginator = query
            .order_by_desc(inventory_transaction::Column::CreatedAt)
            .paginate(db, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((rows, total))
    }

    #[instrument(skip(self))]
    pub async fn get_transaction(&self, id: Uuid) -> Result<TransactionRecord, ServiceError> {
        InventoryTransaction::find_by_id(id)
            .find_also_related(Product)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Inventory transaction", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_adjustment_ignores_the_label() {
        let id = Uuid::new_v4();
        let labelled_out = StockMovement::signed_adjustment(id, TransactionType::Out, 5);
        assert_eq!(labelled_out.next_stock(10), 15);
        assert!(labelled_out.adds_stock());

        let plain_out = StockMovement::new(id, TransactionType::Out, 5);
        assert_eq!(plain_out.next_stock(10), 5);
        assert!(!plain_out.adds_stock());
    }

    #[test]
    fn negative_adjustments_remove_stock() {
        let movement = StockMovement::new(Uuid::new_v4(), TransactionType::Adjustment, -3);
        assert_eq!(movement.next_stock(2), 0);
        assert!(!movement.adds_stock());
    }
}
