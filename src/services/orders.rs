use crate::{
    db::DbPool,
    entities::{
        inventory_transaction::TransactionType,
        order::{self, Entity as Order, OrderStatus},
        order_item::{self, Entity as OrderItem},
        product::{self, Entity as Product},
        recent_activity::ActivityType,
        store::{self, DeliveryDay, Entity as Store},
    },
    errors::ServiceError,
    services::{
        activity::{record_activity, NewActivity},
        inventory::{record_transaction, StockMovement},
        short_reference,
    },
};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Order line as submitted by a client.
#[derive(Debug, Clone)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub store_id: Uuid,
    pub status: Option<OrderStatus>,
    pub delivery_day: Option<DeliveryDay>,
    pub notes: Option<String>,
    pub items: Vec<OrderItemInput>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    pub status: Option<OrderStatus>,
    pub delivery_day: Option<DeliveryDay>,
    pub notes: Option<String>,
    /// A non-empty list replaces every existing line.
    pub items: Option<Vec<OrderItemInput>>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub store_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub type OrderLine = (order_item::Model, Option<product::Model>);

/// An order with its store and lines.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    pub order: order::Model,
    pub store: Option<store::Model>,
    pub items: Vec<OrderLine>,
}

/// Printable receipt of an order.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub order_id: String,
    pub date: String,
    pub store_name: String,
    pub store_location: String,
    pub store_contact: String,
    pub lines: Vec<ReceiptLine>,
    pub totals: OrderTotals,
}

#[derive(Debug, Clone)]
pub struct ReceiptLine {
    pub product: String,
    pub size: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// `tax` is rounded to cents; `total = subtotal + tax`.
    pub fn from_line_totals<I>(line_totals: I, tax_rate: Decimal) -> Self
    where
        I: IntoIterator<Item = Decimal>,
    {
        let subtotal: Decimal = line_totals.into_iter().sum();
        let tax = (subtotal * tax_rate).round_dp(2);
        Self {
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }
}

/// Recomputes and stores the totals of an order from its current lines.
pub async fn recalculate_totals<C>(
    db: &C,
    order: order::Model,
    tax_rate: Decimal,
) -> Result<order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let items = order
        .find_related(OrderItem)
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;
    let totals = OrderTotals::from_line_totals(items.iter().map(|i| i.total), tax_rate);

    let mut active: order::ActiveModel = order.into();
    active.subtotal = Set(totals.subtotal);
    active.tax = Set(totals.tax);
    active.total = Set(totals.total);
    active.update(db).await.map_err(ServiceError::db_error)
}

/// Inserts one line and draws its quantity from stock. Unknown products are
/// skipped and yield `None`.
async fn add_line<C>(
    db: &C,
    order: &order::Model,
    input: &OrderItemInput,
    user_id: Option<Uuid>,
) -> Result<Option<order_item::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let Some(product) = Product::find_by_id(input.product_id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
    else {
        warn!(product_id = %input.product_id, order_id = %order.order_id, "skipping unknown product");
        return Ok(None);
    };

    let quantity = input.quantity.unwrap_or(1);
    if quantity < 1 {
        return Err(ServiceError::ValidationError(
            "quantity must be at least 1".to_string(),
        ));
    }
    let unit_price = input.unit_price.unwrap_or(product.unit_price);
    let now = Utc::now();

    let item = order_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        product_id: Set(product.id),
        quantity: Set(quantity),
        unit_price: Set(unit_price),
        total: Set(Decimal::from(quantity) * unit_price),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(ServiceError::db_error)?;

    record_transaction(
        db,
        StockMovement::new(product.id, TransactionType::Out, quantity)
            .reference(order.order_id.clone())
            .reason(Some(format!("Order: {}", order.order_id)))
            .by(user_id),
    )
    .await?;

    Ok(Some(item))
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Service for orders and their lines
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    tax_rate: Decimal,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, tax_rate: Decimal) -> Self {
        Self { db_pool, tax_rate }
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    async fn find_order(&self, id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Order", id))
    }

    /// Creates the order, its lines, their stock movements and the activity
    /// entry in one database transaction.
    #[instrument(skip(self, new_order), fields(store_id = %new_order.store_id))]
    pub async fn create_order(&self, new_order: NewOrder) -> Result<OrderDetails, ServiceError> {
        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;

        let store = Store::find_by_id(new_order.store_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::BadRequest(format!("Store {} does not exist", new_order.store_id))
            })?;

        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(short_reference("ORD")),
            store_id: Set(store.id),
            created_by: Set(new_order.created_by),
            status: Set(new_order.status.unwrap_or_default()),
            delivery_day: Set(new_order.delivery_day),
            notes: Set(new_order.notes),
            subtotal: Set(Decimal::ZERO),
            tax: Set(Decimal::ZERO),
            total: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        for input in &new_order.items {
            add_line(&txn, &order, input, new_order.created_by).await?;
        }
        let order = recalculate_totals(&txn, order, self.tax_rate).await?;

        record_activity(
            &txn,
            NewActivity::new(
                ActivityType::Order,
                format!("New order {}", order.order_id),
                format!("New order created for {}", store.name),
            )
            .reference(order.order_id.clone())
            .by(new_order.created_by),
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(order_id = %order.order_id, total = %order.total, "order created");
        self.get_order(order.id).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<(order::Model, Option<store::Model>)>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = Order::find().find_also_related(Store);

        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(store_id) = filter.store_id {
            query = query.filter(order::Column::StoreId.eq(store_id));
        }
        if let Some(start) = filter.start_date {
            query = query.filter(order::Column::CreatedAt.gte(day_start(start)));
        }
        if let Some(end) = filter.end_date.and_then(|d| d.checked_add_days(Days::new(1))) {
            query = query.filter(order::Column::CreatedAt.lt(day_start(end)));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((rows, total))
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: Uuid) -> Result<OrderDetails, ServiceError> {
        let db = &*self.db_pool;
        let (order, store) = Order::find_by_id(id)
            .find_also_related(Store)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Order", id))?;

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .find_also_related(Product)
            .order_by_asc(order_item::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(OrderDetails {
            order,
            store,
            items,
        })
    }

    #[instrument(skip(self, changes))]
    pub async fn update_order(
        &self,
        id: Uuid,
        changes: OrderChanges,
        user_id: Option<Uuid>,
    ) -> Result<OrderDetails, ServiceError> {
        let existing = self.find_order(id).await?;
        let was_completed = existing.status == OrderStatus::Completed;

        // field changes, line replacement and totals land together or not at all
        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;
        let mut active: order::ActiveModel = existing.into();
        if let Some(status) = changes.status {
            active.status = Set(status);
        }
        if changes.delivery_day.is_some() {
            active.delivery_day = Set(changes.delivery_day);
        }
        if changes.notes.is_some() {
            active.notes = Set(changes.notes);
        }
        let mut order = active.update(&txn).await.map_err(ServiceError::db_error)?;

        if let Some(items) = changes.items.filter(|items| !items.is_empty()) {
            OrderItem::delete_many()
                .filter(order_item::Column::OrderId.eq(order.id))
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            for input in &items {
                add_line(&txn, &order, input, user_id).await?;
            }
            order = recalculate_totals(&txn, order, self.tax_rate).await?;
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        if !was_completed && order.status == OrderStatus::Completed {
            self.record_completion(&order, user_id).await?;
        }

        self.get_order(order.id).await
    }

    async fn record_completion(
        &self,
        order: &order::Model,
        user_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let store_name = Store::find_by_id(order.store_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .map(|s| s.name)
            .unwrap_or_default();

        record_activity(
            db,
            NewActivity::new(
                ActivityType::Order,
                format!("Order {} completed", order.order_id),
                format!("Order for {} has been completed", store_name),
            )
            .reference(order.order_id.clone())
            .by(user_id),
        )
        .await?;
        info!(order_id = %order.order_id, "order completed");
        Ok(())
    }

    /// Hard delete; lines and delivery cascade.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Order::delete_by_id(id)
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Order", id));
        }
        info!(order = %id, "order deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_items(&self, order_id: Uuid) -> Result<Vec<OrderLine>, ServiceError> {
        Ok(self.get_order(order_id).await?.items)
    }

    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        order_id: Uuid,
        input: OrderItemInput,
        user_id: Option<Uuid>,
    ) -> Result<OrderLine, ServiceError> {
        let db = &*self.db_pool;
        let order = self.find_order(order_id).await?;

        let item = add_line(db, &order, &input, user_id)
            .await?
            .ok_or_else(|| {
                ServiceError::BadRequest(format!("Product {} does not exist", input.product_id))
            })?;
        recalculate_totals(db, order, self.tax_rate).await?;

        self.find_line(order_id, item.id).await
    }

    async fn find_line(&self, order_id: Uuid, item_id: Uuid) -> Result<OrderLine, ServiceError> {
        OrderItem::find_by_id(item_id)
            .filter(order_item::Column::OrderId.eq(order_id))
            .find_also_related(Product)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Order item", item_id))
    }

    /// Changes quantity or price of a line; its total follows.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        quantity: Option<i32>,
        unit_price: Option<Decimal>,
    ) -> Result<OrderLine, ServiceError> {
        let db = &*self.db_pool;
        let order = self.find_order(order_id).await?;
        let (item, _) = self.find_line(order_id, item_id).await?;

        if quantity.is_some_and(|q| q < 1) {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let next_quantity = quantity.unwrap_or(item.quantity);
        let next_price = unit_price.unwrap_or(item.unit_price);

        let mut active: order_item::ActiveModel = item.into();
        active.quantity = Set(next_quantity);
        active.unit_price = Set(next_price);
        active.total = Set(Decimal::from(next_quantity) * next_price);
        active.update(db).await.map_err(ServiceError::db_error)?;
        recalculate_totals(db, order, self.tax_rate).await?;

        self.find_line(order_id, item_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_item(&self, order_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let order = self.find_order(order_id).await?;
        let (item, _) = self.find_line(order_id, item_id).await?;

        item.delete(db).await.map_err(ServiceError::db_error)?;
        recalculate_totals(db, order, self.tax_rate).await?;
        Ok(())
    }

    /// Receipt figures are recomputed from the lines rather than read from the order.
    #[instrument(skip(self))]
    pub async fn receipt(&self, id: Uuid) -> Result<Receipt, ServiceError> {
        let details = self.get_order(id).await?;

        let lines: Vec<ReceiptLine> = details
            .items
            .iter()
            .map(|(item, product)| ReceiptLine {
                product: product.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
                size: product.as_ref().map(|p| p.size.clone()).unwrap_or_default(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total: item.total,
            })
            .collect();
        let totals = OrderTotals::from_line_totals(lines.iter().map(|l| l.total), self.tax_rate);
        let store = details.store.ok_or_else(|| {
            ServiceError::InternalError(format!("Order {} has no store", details.order.order_id))
        })?;

        Ok(Receipt {
            order_id: details.order.order_id.clone(),
            date: details.order.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            store_name: store.name,
            store_location: store.location,
            store_contact: store.number,
            lines,
            totals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn totals_apply_two_percent_tax() {
        let totals = OrderTotals::from_line_totals([dec!(100), dec!(50.50)], dec!(0.02));
        assert_eq!(totals.subtotal, dec!(150.50));
        assert_eq!(totals.tax, dec!(3.01));
        assert_eq!(totals.total, dec!(153.51));
    }

    #[test]
    fn tax_is_rounded_to_cents() {
        let totals = OrderTotals::from_line_totals([dec!(33.33)], dec!(0.02));
        assert_eq!(totals.tax, dec!(0.67));
    }

    #[test]
    fn empty_order_totals_are_zero() {
        let totals = OrderTotals::from_line_totals(Vec::<Decimal>::new(), dec!(0.02));
        assert_eq!(totals.total, Decimal::ZERO);
    }
}
